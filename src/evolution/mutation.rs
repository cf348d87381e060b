//! Mutations — single-symbol edits that carry a credential from one generation to the next
//!
//! Every kind has a fixed fitness impact. Segment-level kinds (duplication,
//! inversion, recombination) are modelled as heavier substitutions.

use crate::crypto::EntropySource;
use crate::error::EntropyError;
use crate::sequence::{Nucleotide, SequenceLimits};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Any different symbol
    PointSubstitution,
    /// Purine to purine or pyrimidine to pyrimidine
    Transition,
    /// Purine to pyrimidine or back
    Transversion,
    Insertion,
    Deletion,
    Duplication,
    Inversion,
    Recombination,
}

impl MutationKind {
    /// Kinds drawn at random by forced evolution
    pub const NATURAL: [MutationKind; 5] = [
        MutationKind::PointSubstitution,
        MutationKind::Transition,
        MutationKind::Transversion,
        MutationKind::Insertion,
        MutationKind::Deletion,
    ];

    /// Signed fitness change contributed by one mutation of this kind
    pub fn impact(&self) -> f64 {
        match self {
            MutationKind::PointSubstitution => -0.05,
            MutationKind::Transition => -0.02,
            MutationKind::Transversion => -0.08,
            MutationKind::Insertion | MutationKind::Deletion => -0.10,
            MutationKind::Duplication | MutationKind::Inversion | MutationKind::Recombination => -0.15,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::PointSubstitution => "Point Mutation",
            MutationKind::Transition => "Transition",
            MutationKind::Transversion => "Transversion",
            MutationKind::Insertion => "Insertion",
            MutationKind::Deletion => "Deletion",
            MutationKind::Duplication => "Duplication",
            MutationKind::Inversion => "Inversion",
            MutationKind::Recombination => "Recombination",
        }
    }

    /// Substitutes in place rather than changing the length
    pub fn is_substitution(&self) -> bool {
        !matches!(self, MutationKind::Insertion | MutationKind::Deletion)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub kind: MutationKind,
    /// Index into the working sequence at the time the mutation was applied
    pub position: usize,
    /// Symbol replaced or removed (`None` for an insertion)
    pub original: Option<Nucleotide>,
    /// Symbol written or inserted (`None` for a deletion)
    pub result: Option<Nucleotide>,
    pub fitness_impact: f64,
    pub timestamp: DateTime<Utc>,
}

impl Mutation {
    /// One-line notification text, e.g. `Transition at 4: A -> G`
    pub fn describe(&self) -> String {
        let symbol = |n: Option<Nucleotide>| n.map(|n| n.as_char()).unwrap_or('-');
        format!(
            "{} at {}: {} -> {}",
            self.kind,
            self.position,
            symbol(self.original),
            symbol(self.result)
        )
    }
}

fn different_symbol(
    original: Nucleotide,
    entropy: &mut dyn EntropySource,
) -> Result<Nucleotide, EntropyError> {
    let others: Vec<Nucleotide> = Nucleotide::ALL.into_iter().filter(|&n| n != original).collect();
    Ok(others[entropy.below(others.len() as u32)? as usize])
}

/// Draw one mutation of `kind` against `symbols`
///
/// A deletion at the minimum length and an insertion at the maximum length
/// are downgraded to point substitutions so the floor and ceiling hold.
pub fn generate_mutation(
    symbols: &[Nucleotide],
    kind: MutationKind,
    limits: &SequenceLimits,
    entropy: &mut dyn EntropySource,
    at: DateTime<Utc>,
) -> Result<Mutation, EntropyError> {
    let len = symbols.len();
    let kind = match kind {
        MutationKind::Deletion if len <= limits.min_len => MutationKind::PointSubstitution,
        MutationKind::Insertion if len >= limits.max_len => MutationKind::PointSubstitution,
        other => other,
    };

    let (position, original, result) = match kind {
        MutationKind::Insertion => {
            let position = entropy.below(len as u32 + 1)? as usize;
            let inserted = Nucleotide::ALL[entropy.below(4)? as usize];
            (position, None, Some(inserted))
        }
        MutationKind::Deletion => {
            let position = entropy.below(len as u32)? as usize;
            (position, Some(symbols[position]), None)
        }
        MutationKind::Transition => {
            let position = entropy.below(len as u32)? as usize;
            let original = symbols[position];
            (position, Some(original), Some(original.transition_partner()))
        }
        MutationKind::Transversion => {
            let position = entropy.below(len as u32)? as usize;
            let original = symbols[position];
            let partners = original.transversion_partners();
            let pick = partners[entropy.below(2)? as usize];
            (position, Some(original), Some(pick))
        }
        MutationKind::PointSubstitution
        | MutationKind::Duplication
        | MutationKind::Inversion
        | MutationKind::Recombination => {
            let position = entropy.below(len as u32)? as usize;
            let original = symbols[position];
            (position, Some(original), Some(different_symbol(original, entropy)?))
        }
    };

    Ok(Mutation {
        kind,
        position,
        original,
        result,
        fitness_impact: kind.impact(),
        timestamp: at,
    })
}

/// Apply one mutation to a working copy in place
pub fn apply_one(working: &mut Vec<Nucleotide>, mutation: &Mutation, min_len: usize) {
    if working.is_empty() {
        return;
    }
    let last = working.len() - 1;
    match mutation.kind {
        MutationKind::Insertion => {
            let position = mutation.position.min(working.len());
            let symbol = mutation.result.unwrap_or(Nucleotide::A);
            working.insert(position, symbol);
        }
        MutationKind::Deletion => {
            let position = mutation.position.min(last);
            if working.len() > min_len {
                working.remove(position);
            } else {
                // Floor reached: substitute instead of shrinking
                working[position] = working[position].complement();
            }
        }
        _ => {
            let position = mutation.position.min(last);
            if let Some(symbol) = mutation.result {
                working[position] = symbol;
            }
        }
    }
}

/// Apply mutations in order to a copy of `symbols`
pub fn apply(symbols: &[Nucleotide], mutations: &[Mutation], min_len: usize) -> Vec<Nucleotide> {
    let mut working = symbols.to_vec();
    for mutation in mutations {
        apply_one(&mut working, mutation, min_len);
    }
    working
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SeededEntropy;

    fn symbols(text: &str) -> Vec<Nucleotide> {
        text.chars().filter_map(Nucleotide::from_char).collect()
    }

    fn text(symbols: &[Nucleotide]) -> String {
        symbols.iter().map(|n| n.as_char()).collect()
    }

    #[test]
    fn test_impacts() {
        assert_eq!(MutationKind::PointSubstitution.impact(), -0.05);
        assert_eq!(MutationKind::Transition.impact(), -0.02);
        assert_eq!(MutationKind::Transversion.impact(), -0.08);
        assert_eq!(MutationKind::Deletion.impact(), -0.10);
        assert_eq!(MutationKind::Recombination.impact(), -0.15);
    }

    #[test]
    fn test_substitution_kinds_change_the_symbol() {
        let seq = symbols("ATGCGTACGTTAGCCA");
        let limits = SequenceLimits::default();
        let mut entropy = SeededEntropy::new(5);
        let now = Utc::now();
        for kind in [
            MutationKind::PointSubstitution,
            MutationKind::Transition,
            MutationKind::Transversion,
            MutationKind::Inversion,
        ] {
            for _ in 0..50 {
                let m = generate_mutation(&seq, kind, &limits, &mut entropy, now).unwrap();
                assert_eq!(m.original, Some(seq[m.position]));
                assert_ne!(m.original, m.result);
                let original = m.original.unwrap();
                let result = m.result.unwrap();
                match kind {
                    MutationKind::Transition => assert_eq!(original.is_purine(), result.is_purine()),
                    MutationKind::Transversion => assert_ne!(original.is_purine(), result.is_purine()),
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_deletion_at_floor_downgrades() {
        let seq = symbols("ATGCGTACGTTA");
        let limits = SequenceLimits::default();
        let m = generate_mutation(&seq, MutationKind::Deletion, &limits, &mut SeededEntropy::new(1), Utc::now())
            .unwrap();
        assert_eq!(m.kind, MutationKind::PointSubstitution);
        assert_eq!(apply(&seq, &[m], limits.min_len).len(), 12);
    }

    #[test]
    fn test_apply_insertion_and_deletion() {
        let seq = symbols("ATGCGTACGTTAGC");
        let now = Utc::now();
        let insert = Mutation {
            kind: MutationKind::Insertion,
            position: 0,
            original: None,
            result: Some(Nucleotide::C),
            fitness_impact: -0.10,
            timestamp: now,
        };
        let delete = Mutation {
            kind: MutationKind::Deletion,
            position: 99,
            original: Some(Nucleotide::C),
            result: None,
            fitness_impact: -0.10,
            timestamp: now,
        };
        let out = apply(&seq, &[insert.clone(), delete.clone()], 12);
        assert_eq!(text(&out), "CATGCGTACGTTAG");
        assert_eq!(insert.describe(), "Insertion at 0: - -> C");
        assert_eq!(delete.describe(), "Deletion at 99: C -> -");
    }

    #[test]
    fn test_replayed_deletion_at_floor_substitutes() {
        let seq = symbols("ATGCGTACGTTA");
        let delete = Mutation {
            kind: MutationKind::Deletion,
            position: 0,
            original: Some(Nucleotide::A),
            result: None,
            fitness_impact: -0.10,
            timestamp: Utc::now(),
        };
        let out = apply(&seq, &[delete], 12);
        assert_eq!(text(&out), "TTGCGTACGTTA");
    }
}
