//! Audit trail — structured events handed to an external, append-only sink
//!
//! Every state-changing engine call emits exactly one [`AuditEvent`] per
//! outcome (plus a Lockout event when a lockout starts). The sink is the
//! durable record; the engine itself keeps only the bounded
//! [`AttemptLog`] for local decisions.

mod attempts;
mod hooks;

pub use attempts::{AttemptLog, AttemptOutcome, AttemptRecord};
pub use hooks::Hooks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Kinds of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Registration,
    RegistrationFailure,
    Revocation,
    AuthSuccess,
    AuthFailure,
    Lockout,
    Evolution,
    ForcedEvolution,
    AncestorAuth,
    KeyChange,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Registration => "REGISTRATION",
            EventKind::RegistrationFailure => "REGISTRATION_FAILURE",
            EventKind::Revocation => "REVOCATION",
            EventKind::AuthSuccess => "AUTH_SUCCESS",
            EventKind::AuthFailure => "AUTH_FAILURE",
            EventKind::Lockout => "LOCKOUT",
            EventKind::Evolution => "EVOLUTION",
            EventKind::ForcedEvolution => "FORCED_EVOLUTION",
            EventKind::AncestorAuth => "ANCESTOR_AUTH",
            EventKind::KeyChange => "KEY_CHANGE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: EventKind,
    pub identity: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    fn new(kind: EventKind, identity: &str, detail: String, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            identity: identity.to_string(),
            detail,
            timestamp: at,
        }
    }

    pub fn registration(identity: &str, mode: &str, tolerance: usize, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::Registration,
            identity,
            format!("New key registered with mode '{}', tolerance {}", mode, tolerance),
            at,
        )
    }

    pub fn registration_failure(identity: &str, reason: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::RegistrationFailure,
            identity,
            format!("Registration rejected - {}", reason),
            at,
        )
    }

    pub fn revocation(identity: &str, reason: &str, at: DateTime<Utc>) -> Self {
        let reason = if reason.is_empty() { "No reason provided" } else { reason };
        Self::new(
            EventKind::Revocation,
            identity,
            format!("Key revoked - Reason: {}", reason),
            at,
        )
    }

    pub fn auth_success(identity: &str, distance: usize, at: DateTime<Utc>) -> Self {
        let detail = if distance == 0 {
            "Authentication successful".to_string()
        } else {
            format!("Authentication successful (fuzzy, {} edit(s))", distance)
        };
        Self::new(EventKind::AuthSuccess, identity, detail, at)
    }

    pub fn auth_failure(identity: &str, reason: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::AuthFailure,
            identity,
            format!("Authentication failed - {}", reason),
            at,
        )
    }

    pub fn lockout(identity: &str, failed_attempts: u32, until: DateTime<Utc>, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::Lockout,
            identity,
            format!(
                "Account locked after {} failed attempts until {}",
                failed_attempts,
                until.to_rfc3339()
            ),
            at,
        )
    }

    pub fn evolution(
        identity: &str,
        from: u32,
        to: u32,
        mutations: usize,
        forced: bool,
        at: DateTime<Utc>,
    ) -> Self {
        let (kind, label) = if forced {
            (EventKind::ForcedEvolution, "Forced evolution:")
        } else {
            (EventKind::Evolution, "Natural evolution:")
        };
        Self::new(
            kind,
            identity,
            format!("{} Gen {} -> Gen {} ({} mutations)", label, from, to, mutations),
            at,
        )
    }

    pub fn ancestor_auth(identity: &str, generations_back: usize, penalty: f64, at: DateTime<Utc>) -> Self {
        let detail = if generations_back == 0 {
            "Ancestor authentication matched current generation".to_string()
        } else {
            format!(
                "Ancestor authentication successful ({} generation(s) back, penalty {:.0}%)",
                generations_back,
                penalty * 100.0
            )
        };
        Self::new(EventKind::AncestorAuth, identity, detail, at)
    }

    pub fn key_change(identity: &str, new_generation: u32, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::KeyChange,
            identity,
            format!("Key changed by user, new generation {}", new_generation),
            at,
        )
    }

    pub fn key_change_rejected(identity: &str, reason: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::KeyChange,
            identity,
            format!("Key change rejected - {}", reason),
            at,
        )
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} '{}': {}",
            self.timestamp.to_rfc3339(),
            self.kind,
            self.identity,
            self.detail
        )
    }
}

/// Receiver of audit events. Treated as authoritative and append-only.
pub trait AuditSink: Send + Sync {
    fn log_event(&mut self, event: &AuditEvent);
}

/// Forwards events to the `log` facade under the `genekey::audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn log_event(&mut self, event: &AuditEvent) {
        match event.kind {
            EventKind::AuthFailure
            | EventKind::RegistrationFailure
            | EventKind::Lockout
            | EventKind::Revocation => {
                log::warn!(target: "genekey::audit", "{}", event)
            }
            _ => log::info!(target: "genekey::audit", "{}", event),
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AuditSink for NullSink {
    fn log_event(&mut self, _event: &AuditEvent) {}
}

/// Collects events in memory; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }
}

impl AuditSink for MemorySink {
    fn log_event(&mut self, event: &AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
