//! Credential registry — one key per identity, never physically deleted
//!
//! Admission goes through [`admit`]: parse, then the complexity gate. Keys
//! are revoked rather than removed so the audit trail stays continuous.

mod key;

pub use key::{CredentialKey, KeyOptions, LockoutPolicy};

#[cfg(test)]
pub(crate) use key::sample_key;

use crate::config::EngineConfig;
use crate::error::{AuthError, Result};
use crate::sequence::{self, Analysis, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parse `raw` and run it through the complexity gate
pub fn admit(raw: &str, config: &EngineConfig) -> Result<(Sequence, Analysis)> {
    let seq = sequence::parse(raw, &config.limits)?;
    let analysis = sequence::analyze(&seq);
    if analysis.complexity < config.min_complexity
        || (config.require_acceptable && !analysis.acceptable)
    {
        return Err(AuthError::LowComplexity(analysis.complexity));
    }
    Ok((seq, analysis))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    keys: HashMap<String, CredentialKey>,
    next_key_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic key id
    pub fn allocate_id(&mut self) -> u64 {
        self.next_key_id += 1;
        self.next_key_id
    }

    pub fn insert(&mut self, key: CredentialKey) -> Result<()> {
        if self.keys.contains_key(&key.identity) {
            return Err(AuthError::UserExists(key.identity));
        }
        self.keys.insert(key.identity.clone(), key);
        Ok(())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.keys.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Result<&CredentialKey> {
        self.keys
            .get(identity)
            .ok_or_else(|| AuthError::UserNotFound(identity.to_string()))
    }

    pub fn get_mut(&mut self, identity: &str) -> Result<&mut CredentialKey> {
        self.keys
            .get_mut(identity)
            .ok_or_else(|| AuthError::UserNotFound(identity.to_string()))
    }

    /// Sorted for stable output
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn keys(&self) -> impl Iterator<Item = &CredentialKey> {
        self.keys.values()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn revoked_count(&self) -> usize {
        self.keys.values().filter(|k| k.revoked).count()
    }
}
