//! Fitness under selection pressure

use super::lineage::{Lineage, SelectionPressure};
use crate::config::EvolutionConfig;
use chrono::{DateTime, Utc};

/// Cap on the usage bonus
pub const MAX_USAGE_BONUS: f64 = 0.2;
/// Fitness lost per failed authentication under adaptive pressure
pub const FAILURE_PENALTY: f64 = 0.02;

/// Fitness floor and ceiling after an evolution
pub const EVOLVED_FITNESS_MIN: f64 = 0.1;
pub const EVOLVED_FITNESS_MAX: f64 = 1.0;

/// Pressure-adjusted fitness of the current generation, clamped to [0, 1]
pub fn calculate_fitness(lineage: &Lineage, now: DateTime<Utc>, config: &EvolutionConfig) -> f64 {
    let current = lineage.current();
    let mut fitness = current.fitness;

    match lineage.pressure {
        SelectionPressure::Usage => {
            fitness += (current.auth_successes as f64 / 100.0).min(MAX_USAGE_BONUS);
        }
        SelectionPressure::Time => {
            if now > lineage.next_evolution && lineage.interval_secs > 0 {
                let overdue = (now - lineage.next_evolution).num_seconds();
                let periods = overdue / lineage.interval_secs;
                fitness -= periods as f64 * config.fitness_decay;
            }
        }
        SelectionPressure::Adaptive => {
            fitness -= current.auth_failures as f64 * FAILURE_PENALTY;
        }
        SelectionPressure::None | SelectionPressure::Environmental => {}
    }

    fitness.clamp(0.0, 1.0)
}

/// Fitness of a child from its parent's fitness and the mutations' summed impact
pub fn evolved_fitness(parent: f64, total_impact: f64) -> f64 {
    (parent + total_impact).clamp(EVOLVED_FITNESS_MIN, EVOLVED_FITNESS_MAX)
}
