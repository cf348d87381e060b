//! Sequence matching — edit distance and match reports
//!
//! Exact authentication compares derived hashes; this module is used where
//! plaintext is compared directly (fuzzy tolerance and ancestor lookup).

use serde::{Deserialize, Serialize};

/// Longest input accepted by [`levenshtein`]
pub const MAX_EDIT_INPUT: usize = 50_000;

/// Case-insensitive edit distance with two-row memory
///
/// Returns `None` when either input exceeds [`MAX_EDIT_INPUT`] symbols.
pub fn levenshtein(a: &str, b: &str) -> Option<usize> {
    let a: Vec<u8> = a.bytes().map(|c| c.to_ascii_uppercase()).collect();
    let b: Vec<u8> = b.bytes().map(|c| c.to_ascii_uppercase()).collect();
    if a.len() > MAX_EDIT_INPUT || b.len() > MAX_EDIT_INPUT {
        return None;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    Some(prev[b.len()])
}

/// Outcome of comparing a candidate against a stored sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub matched: bool,
    pub exact: bool,
    pub distance: usize,
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize,
    /// `1 - distance / longer length`
    pub similarity: f64,
    /// Set by ancestor authentication: how many generations back matched
    pub generation_back: Option<usize>,
    /// Trust penalty attached to an ancestor match
    pub penalty: f64,
}

impl MatchDetail {
    /// Exact hash match
    pub fn exact() -> Self {
        Self {
            matched: true,
            exact: true,
            similarity: 1.0,
            ..Self::default()
        }
    }

    /// Ancestor match `back` generations before current
    pub fn ancestor(back: usize, penalty: f64) -> Self {
        Self {
            generation_back: Some(back),
            penalty,
            ..Self::exact()
        }
    }
}

/// Compare `candidate` to `stored`, accepting up to `tolerance` edits
///
/// The edit breakdown is approximate: a length difference is attributed to
/// insertions or deletions and the rest of the distance to substitutions.
pub fn compare(stored: &str, candidate: &str, tolerance: usize) -> MatchDetail {
    let (len_s, len_c) = (stored.len(), candidate.len());
    let longest = len_s.max(len_c);
    let distance = levenshtein(stored, candidate).unwrap_or(longest);

    let (substitutions, insertions, deletions) = if len_s == len_c {
        let subs = stored
            .bytes()
            .zip(candidate.bytes())
            .filter(|(a, b)| !a.eq_ignore_ascii_case(b))
            .count();
        (subs, 0, 0)
    } else if len_s > len_c {
        let deletions = len_s - len_c;
        (distance.saturating_sub(deletions), 0, deletions)
    } else {
        let insertions = len_c - len_s;
        (distance.saturating_sub(insertions), insertions, 0)
    };

    MatchDetail {
        matched: distance <= tolerance,
        exact: distance == 0,
        distance,
        substitutions,
        insertions,
        deletions,
        similarity: if longest == 0 { 1.0 } else { 1.0 - distance as f64 / longest as f64 },
        generation_back: None,
        penalty: 0.0,
    }
}
