//! Time source for expiry, lockout and evolution scheduling

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Longest span accepted for intervals, lockouts and scheduler periods (100 years)
pub const MAX_SPAN_SECS: i64 = 100 * 365 * 24 * 3600;

/// `secs` as a duration, clamped to `0..=MAX_SPAN_SECS`
pub fn span(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(0, MAX_SPAN_SECS))
}

/// `at + secs`, saturating at the latest representable instant
pub fn after(at: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    at.checked_add_signed(span(secs)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();
        handle.advance(Duration::seconds(301));
        assert_eq!(clock.now(), start + Duration::seconds(301));
        clock.set(start);
        assert_eq!(handle.now(), start);
    }

    #[test]
    fn test_after_clamps_huge_and_negative_spans() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(after(start, 60), start + Duration::seconds(60));
        assert_eq!(after(start, -5), start);
        assert_eq!(after(start, i64::MAX), start + Duration::seconds(MAX_SPAN_SECS));
        assert_eq!(after(DateTime::<Utc>::MAX_UTC, 1), DateTime::<Utc>::MAX_UTC);
        assert_eq!(span(i64::MIN), Duration::zero());
    }
}
