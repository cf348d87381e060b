//! genekey — evolving nucleotide-sequence credentials
//!
//! A credential is a DNA-like sequence over {A,T,G,C}. It is admitted only
//! if complex enough, stored as a salted hash, and may evolve over time by
//! random mutation, with older generations optionally still recognized
//! through ancestor authentication.

pub mod audit;
pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod evolution;
pub mod registry;
pub mod sequence;
pub mod storage;

pub use audit::{AuditEvent, AuditSink, EventKind, Hooks, LogSink, MemorySink, NullSink};
pub use auth::{levenshtein, MatchDetail};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, EvolutionConfig};
pub use crypto::{DerivationMode, DigestProvider, EntropySource, OsEntropy, SeededEntropy, Sha256Digest};
pub use engine::{Engine, EngineBuilder, EngineStats, SharedEngine};
pub use error::{AuthError, EntropyError, Result, ValidationError};
pub use evolution::{AncestorPolicy, EvolutionEvent, Generation, Lineage, Mutation, MutationKind, SelectionPressure};
pub use registry::{CredentialKey, KeyOptions, LockoutPolicy};
pub use sequence::{Analysis, Complexity, Sequence, SequenceLimits};
