//! CredentialKey — one stored credential per identity, with lockout state

use crate::clock;
use crate::crypto::{CredentialHash, DerivationMode, Salt};
use crate::error::AuthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options chosen at registration time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyOptions {
    pub mode: DerivationMode,
    /// Maximum edit distance this key will ever tolerate
    pub tolerance: usize,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self {
            mode: DerivationMode::RawBinary,
            tolerance: 0,
            expires_at: None,
        }
    }
}

/// Consecutive-failure lockout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lockout_secs: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialKey {
    pub key_id: u64,
    pub identity: String,
    pub salt: Salt,
    pub mode: DerivationMode,
    /// Hash of the lineage's current generation
    pub hash: CredentialHash,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub revoke_reason: Option<String>,
    /// Consecutive failures; reset only by a success
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub auth_count: u64,
    pub tolerance: usize,
}

impl CredentialKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    /// The lockout expiry, if still in force at `now`
    pub fn locked_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lockout_until.filter(|&until| now < until)
    }

    /// Revoked, then expired, then locked out
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), AuthError> {
        if self.revoked {
            return Err(AuthError::Revoked(
                self.revoke_reason.clone().unwrap_or_default(),
            ));
        }
        if self.is_expired(now) {
            return Err(AuthError::Expired);
        }
        if let Some(until) = self.locked_until(now) {
            return Err(AuthError::LockedOut { until });
        }
        Ok(())
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.failed_attempts = 0;
        self.lockout_until = None;
        self.last_used = Some(now);
        self.auth_count += 1;
    }

    /// Count a failure; returns the new lockout expiry if this failure triggered one
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) -> Option<DateTime<Utc>> {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= policy.max_failed_attempts {
            let until = clock::after(now, policy.lockout_secs);
            self.lockout_until = Some(until);
            Some(until)
        } else {
            None
        }
    }

    pub fn revoke(&mut self, reason: &str) {
        self.revoked = true;
        self.revoke_reason = Some(reason.to_string());
    }

    pub fn summary(&self) -> String {
        format!(
            "Key #{} '{}' | mode={} | tolerance={} | uses={} | failures={}{}",
            self.key_id,
            self.identity,
            self.mode,
            self.tolerance,
            self.auth_count,
            self.failed_attempts,
            if self.revoked { " | REVOKED" } else { "" }
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_key(identity: &str, now: DateTime<Utc>) -> CredentialKey {
    CredentialKey {
        key_id: 1,
        identity: identity.to_string(),
        salt: Salt::from_bytes([7u8; crate::crypto::SALT_LEN]),
        mode: DerivationMode::RawBinary,
        hash: CredentialHash::from_digest(&[0u8; 32]),
        created_at: now,
        expires_at: None,
        revoked: false,
        revoke_reason: None,
        failed_attempts: 0,
        lockout_until: None,
        last_used: None,
        auth_count: 0,
        tolerance: 0,
    }
}
