//! State snapshots — checksummed JSON export of everything the engine owns
//!
//! The engine never touches the filesystem. A snapshot is a string the
//! caller stores wherever it likes and hands back to `import_state`.

use crate::engine::EngineStats;
use crate::error::{AuthError, Result};
use crate::evolution::{EvolutionEvent, Lineage};
use crate::registry::Registry;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Snapshot format written by this version
pub const FORMAT_VERSION: u32 = 1;

/// Credential state carried across restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub registry: Registry,
    pub lineages: HashMap<String, Lineage>,
    pub evolution_events: Vec<EvolutionEvent>,
    pub stats: EngineStats,
}

/// Envelope around the serialized state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub identity_count: usize,
    /// SHA-256 of `payload`
    pub checksum: String,
    pub payload: String,
}

fn checksum(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

impl EngineState {
    pub fn to_snapshot(&self, now: DateTime<Utc>) -> Result<String> {
        let payload = serde_json::to_string(self)?;
        let snapshot = Snapshot {
            version: FORMAT_VERSION,
            timestamp: now,
            identity_count: self.registry.len(),
            checksum: checksum(&payload),
            payload,
        };
        info!(
            "Exported snapshot: {} identities, {} bytes",
            snapshot.identity_count,
            snapshot.payload.len()
        );
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Parse a snapshot, refusing unknown versions and checksum mismatches
    pub fn from_snapshot(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.version != FORMAT_VERSION {
            return Err(AuthError::Storage(format!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version, FORMAT_VERSION
            )));
        }
        let actual = checksum(&snapshot.payload);
        if actual != snapshot.checksum {
            return Err(AuthError::Storage(format!(
                "Checksum mismatch: expected {}, got {}",
                snapshot.checksum, actual
            )));
        }
        let state: EngineState = serde_json::from_str(&snapshot.payload)?;
        for (identity, lineage) in &state.lineages {
            if !state.registry.contains(identity) {
                return Err(AuthError::Storage(format!("Lineage without key: {}", identity)));
            }
            if !lineage.is_consistent() {
                return Err(AuthError::Storage(format!("Corrupt lineage: {}", identity)));
            }
        }
        for key in state.registry.keys() {
            let lineage = state
                .lineages
                .get(&key.identity)
                .ok_or_else(|| AuthError::Storage(format!("Key without lineage: {}", key.identity)))?;
            if !key.hash.matches(&lineage.current().hash) {
                return Err(AuthError::Storage(format!(
                    "Key hash does not match current generation: {}",
                    key.identity
                )));
            }
        }
        Ok(state)
    }
}
