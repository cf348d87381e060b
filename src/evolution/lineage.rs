//! Lineage — the generation history of one identity's credential
//!
//! Generations live in an arena indexed by `id - 1`. Ids are assigned in
//! creation order and every non-root generation names exactly one parent,
//! so the current generation is always reachable from the root.

use super::mutation::Mutation;
use crate::clock;
use crate::config::EvolutionConfig;
use crate::crypto::CredentialHash;
use crate::sequence::Sequence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What drives a lineage's fitness between evolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionPressure {
    /// Never evolved by the scheduler
    None,
    /// Fitness decays for every missed evolution interval
    Time,
    /// Successful authentications raise fitness
    Usage,
    Environmental,
    /// Failed authentications lower fitness
    Adaptive,
}

impl SelectionPressure {
    pub fn name(&self) -> &'static str {
        match self {
            SelectionPressure::None => "None",
            SelectionPressure::Time => "Time-based",
            SelectionPressure::Usage => "Usage-based",
            SelectionPressure::Environmental => "Environmental",
            SelectionPressure::Adaptive => "Adaptive",
        }
    }
}

impl fmt::Display for SelectionPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether older generations may still authenticate, and at what cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AncestorPolicy {
    pub allowed: bool,
    /// Furthest a lookup may walk back from the current generation
    pub max_depth: usize,
    /// Trust penalty per generation back
    pub penalty_per_generation: f64,
}

impl AncestorPolicy {
    pub fn from_config(config: &EvolutionConfig) -> Self {
        Self {
            allowed: config.allow_ancestor_auth,
            max_depth: config.max_ancestor_depth,
            penalty_per_generation: config.ancestor_penalty,
        }
    }

    pub fn penalty(&self, generations_back: usize) -> f64 {
        generations_back as f64 * self.penalty_per_generation
    }
}

/// Scheduling state of a lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineageState {
    /// No evolution due
    Stable,
    /// Scheduled evolution time has passed
    Due,
    /// Evolved at this instant; next evolution freshly scheduled
    Evolved,
}

/// One credential sequence in a lineage. Immutable once superseded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: u32,
    /// 0 for the root
    pub parent_id: u32,
    /// Normalized plaintext, kept for ancestor and fuzzy matching
    pub sequence: String,
    pub length: usize,
    pub hash: CredentialHash,
    /// In [0, 1]
    pub fitness: f64,
    pub created_at: DateTime<Utc>,
    /// Set when a child supersedes this generation
    pub evolved_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// Mutations that produced this generation from its parent
    pub mutations: Vec<Mutation>,
    pub auth_successes: u64,
    pub auth_failures: u64,
}

impl Generation {
    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    generations: Vec<Generation>,
    root: usize,
    current: usize,
    pub total_mutations: u64,
    pub pressure: SelectionPressure,
    pub mutation_rate: f64,
    pub interval_secs: i64,
    pub next_evolution: DateTime<Utc>,
    pub ancestor_policy: AncestorPolicy,
    /// Fitness as of the last evolution or fitness update
    pub cumulative_fitness: f64,
}

impl Lineage {
    /// Start a lineage from its root generation at full fitness
    pub fn new(sequence: &Sequence, hash: CredentialHash, config: &EvolutionConfig, now: DateTime<Utc>) -> Self {
        let root = Generation {
            id: 1,
            parent_id: 0,
            sequence: sequence.as_str().to_string(),
            length: sequence.len(),
            hash,
            fitness: 1.0,
            created_at: now,
            evolved_at: None,
            active: true,
            mutations: Vec::new(),
            auth_successes: 0,
            auth_failures: 0,
        };
        Self {
            generations: vec![root],
            root: 0,
            current: 0,
            total_mutations: 0,
            pressure: config.default_pressure,
            mutation_rate: config.mutation_rate,
            interval_secs: config.interval_secs,
            next_evolution: clock::after(now, config.interval_secs),
            ancestor_policy: AncestorPolicy::from_config(config),
            cumulative_fitness: 1.0,
        }
    }

    /// Number of generations ever created (the highest id)
    pub fn total_generations(&self) -> u32 {
        self.generations.len() as u32
    }

    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn generation(&self, id: u32) -> Option<&Generation> {
        let index = (id as usize).checked_sub(1)?;
        self.generations.get(index)
    }

    pub fn generation_mut(&mut self, id: u32) -> Option<&mut Generation> {
        let index = (id as usize).checked_sub(1)?;
        self.generations.get_mut(index)
    }

    pub fn current(&self) -> &Generation {
        &self.generations[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Generation {
        &mut self.generations[self.current]
    }

    pub fn root(&self) -> &Generation {
        &self.generations[self.root]
    }

    /// Arena invariants: ids match positions, parents precede children,
    /// root and current point inside the arena
    pub fn is_consistent(&self) -> bool {
        self.root < self.generations.len()
            && self.current < self.generations.len()
            && self.generations.iter().enumerate().all(|(i, g)| {
                g.id as usize == i + 1 && (g.is_root() || (g.parent_id >= 1 && g.parent_id < g.id))
            })
    }

    fn parent_of(&self, generation: &Generation) -> Option<&Generation> {
        if generation.is_root() {
            None
        } else {
            self.generation(generation.parent_id)
        }
    }

    /// Walk `n` parent links back from current, stopping at the root
    pub fn get_ancestor(&self, n: usize) -> &Generation {
        let mut generation = self.current();
        for _ in 0..n {
            match self.parent_of(generation) {
                Some(parent) => generation = parent,
                None => break,
            }
        }
        generation
    }

    /// Current generation first, then up to `max_back` ancestors
    pub fn ancestry(&self, max_back: usize) -> Vec<(usize, &Generation)> {
        let mut out = Vec::with_capacity(max_back.min(self.generations.len()) + 1);
        let mut generation = Some(self.current());
        let mut back = 0;
        while let Some(g) = generation {
            if back > max_back {
                break;
            }
            out.push((back, g));
            generation = self.parent_of(g);
            back += 1;
        }
        out
    }

    /// Parent links between current and root
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut generation = self.current();
        while let Some(parent) = self.parent_of(generation) {
            generation = parent;
            depth += 1;
        }
        depth
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_evolution
    }

    pub fn state(&self, now: DateTime<Utc>) -> LineageState {
        if self.current().evolved_at.is_none()
            && !self.current().is_root()
            && self.current().created_at == now
        {
            LineageState::Evolved
        } else if self.is_due(now) {
            LineageState::Due
        } else {
            LineageState::Stable
        }
    }

    /// Append a child of the current generation and make it current
    pub fn push_child(
        &mut self,
        sequence: &Sequence,
        hash: CredentialHash,
        mutations: Vec<Mutation>,
        fitness: f64,
        now: DateTime<Utc>,
    ) -> u32 {
        let id = self.total_generations() + 1;
        let parent = self.current_mut();
        parent.active = false;
        parent.evolved_at = Some(now);
        let parent_id = parent.id;

        self.total_mutations += mutations.len() as u64;
        self.generations.push(Generation {
            id,
            parent_id,
            sequence: sequence.as_str().to_string(),
            length: sequence.len(),
            hash,
            fitness,
            created_at: now,
            evolved_at: None,
            active: true,
            mutations,
            auth_successes: 0,
            auth_failures: 0,
        });
        self.current = self.generations.len() - 1;
        self.cumulative_fitness = fitness;
        self.next_evolution = clock::after(now, self.interval_secs);
        id
    }

    /// Every mutation in the lineage, oldest generation first
    pub fn mutation_history(&self) -> Vec<&Mutation> {
        self.generations.iter().flat_map(|g| g.mutations.iter()).collect()
    }
}
