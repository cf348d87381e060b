//! Evolution — credentials that drift over time
//!
//! Each identity owns a [`Lineage`]. Scheduled or forced evolution applies a
//! small random mutation set to the current generation's sequence, producing
//! a child generation that supersedes it. Superseded generations stay in the
//! arena so that ancestor authentication can still recognize them.

mod fitness;
mod lineage;
mod mutation;

pub use fitness::{calculate_fitness, evolved_fitness, EVOLVED_FITNESS_MAX, EVOLVED_FITNESS_MIN};
pub use lineage::{AncestorPolicy, Generation, Lineage, LineageState, SelectionPressure};
pub use mutation::{apply, apply_one, generate_mutation, Mutation, MutationKind};

use crate::crypto::EntropySource;
use crate::error::EntropyError;
use crate::sequence::{Nucleotide, SequenceLimits};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whole mutation sets redrawn before falling back to a single transition
pub const MAX_DIFFERENCE_RETRIES: usize = 8;

/// Record of one lineage transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub id: Uuid,
    pub identity: String,
    pub from_generation: u32,
    pub to_generation: u32,
    pub mutations: Vec<Mutation>,
    pub fitness_before: f64,
    pub fitness_after: f64,
    /// Forced by a caller rather than drawn by the scheduler
    pub forced: bool,
    pub notification: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EvolutionEvent {
    pub fn total_impact(&self) -> f64 {
        self.mutations.iter().map(|m| m.fitness_impact).sum()
    }

    /// Human-readable summary, one line per mutation
    pub fn describe(&self) -> String {
        let mut out = format!(
            "'{}' evolved: Gen {} -> Gen {} ({} mutations, fitness {:.2} -> {:.2}){}",
            self.identity,
            self.from_generation,
            self.to_generation,
            self.mutations.len(),
            self.fitness_before,
            self.fitness_after,
            if self.forced { " [forced]" } else { "" }
        );
        for m in &self.mutations {
            out.push_str("\n  ");
            out.push_str(&m.describe());
        }
        out
    }
}

/// One Bernoulli trial per slot at `rate`; never fewer than one mutation
pub fn draw_mutation_count(
    rate: f64,
    slots: usize,
    entropy: &mut dyn EntropySource,
) -> Result<usize, EntropyError> {
    let mut count = 0;
    for _ in 0..slots {
        if entropy.unit()? < rate {
            count += 1;
        }
    }
    Ok(count.max(1))
}

/// Apply `count` random mutations to `parent`, guaranteeing the child differs
///
/// If every redraw happens to reproduce the parent (an insertion undone by a
/// deletion, say), a transition is appended to the last draw.
pub fn breed(
    parent: &[Nucleotide],
    count: usize,
    limits: &SequenceLimits,
    entropy: &mut dyn EntropySource,
    at: DateTime<Utc>,
) -> Result<(Vec<Nucleotide>, Vec<Mutation>), EntropyError> {
    let mut attempts = 0;
    loop {
        let mut working = parent.to_vec();
        let mut mutations = Vec::with_capacity(count + 1);
        for _ in 0..count {
            let kind = MutationKind::NATURAL[entropy.below(MutationKind::NATURAL.len() as u32)? as usize];
            let m = generate_mutation(&working, kind, limits, entropy, at)?;
            apply_one(&mut working, &m, limits.min_len);
            mutations.push(m);
        }
        if working != parent {
            return Ok((working, mutations));
        }

        attempts += 1;
        if attempts >= MAX_DIFFERENCE_RETRIES {
            log::debug!("Mutation set reproduced the parent {} times, forcing a transition", attempts);
            let m = generate_mutation(&working, MutationKind::Transition, limits, entropy, at)?;
            apply_one(&mut working, &m, limits.min_len);
            mutations.push(m);
            return Ok((working, mutations));
        }
    }
}
