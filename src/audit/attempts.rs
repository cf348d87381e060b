//! Bounded, most-recent-first record of authentication attempts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success,
    Failure(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: u64,
    pub identity: String,
    pub outcome: AttemptOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttemptLog {
    records: VecDeque<AttemptRecord>,
    cap: usize,
    next_id: u64,
}

impl AttemptLog {
    pub fn new(cap: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(cap.min(1024)),
            cap,
            next_id: 1,
        }
    }

    /// Push a record at the front, dropping the oldest beyond the cap
    pub fn record(&mut self, identity: &str, outcome: AttemptOutcome, at: DateTime<Utc>) -> u64 {
        let attempt_id = self.next_id;
        self.next_id += 1;
        self.records.push_front(AttemptRecord {
            attempt_id,
            identity: identity.to_string(),
            outcome,
            timestamp: at,
        });
        self.records.truncate(self.cap);
        attempt_id
    }

    /// Newest first; `limit == 0` means no limit
    pub fn recent(&self, identity: &str, limit: usize) -> Vec<&AttemptRecord> {
        let matching = self.records.iter().filter(|r| r.identity == identity);
        if limit == 0 {
            matching.collect()
        } else {
            matching.take(limit).collect()
        }
    }

    /// Failures recorded for `identity` at or after `since`
    pub fn failures_since(&self, identity: &str, since: DateTime<Utc>) -> usize {
        self.records
            .iter()
            .take_while(|r| r.timestamp >= since)
            .filter(|r| r.identity == identity && !r.outcome.is_success())
            .count()
    }

    pub fn clear(&mut self, identity: &str) {
        self.records.retain(|r| r.identity != identity);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
