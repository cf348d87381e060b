//! Error types for sequence validation, entropy and authentication.

use crate::sequence::Complexity;
use chrono::{DateTime, Utc};

/// Why raw input could not become a [`Sequence`](crate::sequence::Sequence)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty sequence")]
    Empty,

    #[error("Sequence too short: {len} symbols (min {min})")]
    TooShort { len: usize, min: usize },

    #[error("Sequence too long: {len} symbols (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Invalid nucleotide '{symbol}' at position {position}")]
    InvalidSymbol { symbol: char, position: usize },
}

/// Failure of the secure random source
#[derive(Debug, thiserror::Error)]
pub enum EntropyError {
    #[error("Secure random source unavailable: {0}")]
    Unavailable(String),

    #[error("Secure random source produced an all-zero salt")]
    ZeroSalt,
}

/// Errors returned by registry, authentication and evolution operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid sequence: {0}")]
    InvalidSequence(#[from] ValidationError),

    #[error("Sequence complexity too low ({0})")]
    LowComplexity(Complexity),

    #[error("User already registered: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Key revoked: {0}")]
    Revoked(String),

    #[error("Key expired")]
    Expired,

    #[error("Account locked until {until}")]
    LockedOut { until: DateTime<Utc> },

    #[error("No match")]
    NoMatch,

    #[error("Ancestor authentication not allowed for this lineage")]
    AncestorAuthDisabled,

    #[error("Lineage reached the generation ceiling ({0})")]
    GenerationCeiling(u32),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EntropyError> for AuthError {
    fn from(e: EntropyError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl AuthError {
    /// Short label used in audit details and attempt records
    pub fn label(&self) -> &'static str {
        match self {
            AuthError::InvalidSequence(_) => "Invalid sequence",
            AuthError::LowComplexity(_) => "Low complexity",
            AuthError::UserExists(_) => "User exists",
            AuthError::UserNotFound(_) => "User not found",
            AuthError::Revoked(_) => "Key revoked",
            AuthError::Expired => "Key expired",
            AuthError::LockedOut { .. } => "Account locked",
            AuthError::NoMatch => "No match",
            AuthError::AncestorAuthDisabled => "Ancestor auth disabled",
            AuthError::GenerationCeiling(_) => "Generation ceiling",
            AuthError::Storage(_) => "Storage error",
            AuthError::Internal(_) => "Internal error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
