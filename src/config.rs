//! Engine configuration
//!
//! Plain data with sensible defaults and a couple of presets. Lineage
//! settings here are only the defaults copied into each new lineage;
//! they can be changed per identity afterwards.

use crate::crypto::DerivationMode;
use crate::evolution::SelectionPressure;
use crate::registry::LockoutPolicy;
use crate::sequence::{Complexity, SequenceLimits};
use serde::{Deserialize, Serialize};

/// Defaults for evolution and ancestor authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Lineage depth ceiling; evolution refuses to go beyond it
    pub max_generations: u32,
    /// Seconds between scheduled evolutions
    pub interval_secs: i64,
    /// Probability of a mutation in each slot
    pub mutation_rate: f64,
    pub max_mutations_per_generation: usize,
    /// Trust penalty per generation back for ancestor matches
    pub ancestor_penalty: f64,
    pub max_ancestor_depth: usize,
    pub allow_ancestor_auth: bool,
    pub default_pressure: SelectionPressure,
    /// Fitness lost per missed evolution interval under time pressure
    pub fitness_decay: f64,
    pub fitness_warning_threshold: f64,
    /// Minimum seconds between two scheduler passes
    pub scheduler_check_secs: i64,
    /// Evolution events retained in memory
    pub event_log_cap: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_generations: 100,
            interval_secs: 7 * 24 * 3600,
            mutation_rate: 0.02,
            max_mutations_per_generation: 3,
            ancestor_penalty: 0.1,
            max_ancestor_depth: 5,
            allow_ancestor_auth: true,
            default_pressure: SelectionPressure::Time,
            fitness_decay: 0.05,
            fitness_warning_threshold: 0.3,
            scheduler_check_secs: 3600,
            event_log_cap: 10_000,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub limits: SequenceLimits,
    /// Lowest complexity tier accepted at registration
    pub min_complexity: Complexity,
    /// Also require the analyzer's `acceptable` verdict
    pub require_acceptable: bool,
    pub default_mode: DerivationMode,
    /// Default maximum edit distance tolerated for new keys
    pub default_tolerance: usize,
    pub max_failed_attempts: u32,
    pub lockout_secs: i64,
    /// Attempt records retained in the in-memory ring
    pub attempt_log_cap: usize,
    pub evolution: EvolutionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: SequenceLimits::default(),
            min_complexity: Complexity::Medium,
            require_acceptable: true,
            default_mode: DerivationMode::RawBinary,
            default_tolerance: 0,
            max_failed_attempts: 5,
            lockout_secs: 300,
            attempt_log_cap: 1000,
            evolution: EvolutionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Longer sequences, High complexity, fewer attempts, no ancestor auth
    pub fn strict() -> Self {
        Self {
            limits: SequenceLimits { min_len: 24, max_len: 512 },
            min_complexity: Complexity::High,
            max_failed_attempts: 3,
            lockout_secs: 900,
            evolution: EvolutionConfig {
                allow_ancestor_auth: false,
                max_ancestor_depth: 1,
                ..EvolutionConfig::default()
            },
            ..Self::default()
        }
    }

    /// Tolerant matching and a deep ancestor window
    pub fn relaxed() -> Self {
        Self {
            default_tolerance: 2,
            max_failed_attempts: 10,
            lockout_secs: 60,
            evolution: EvolutionConfig {
                max_ancestor_depth: 10,
                ancestor_penalty: 0.05,
                ..EvolutionConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_failed_attempts: self.max_failed_attempts,
            lockout_secs: self.lockout_secs,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
