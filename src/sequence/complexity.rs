//! Complexity analysis — the admission gate for credential sequences
//!
//! Entropy, simple-repeat and palindrome detection, and a four-tier
//! classification ladder. Registration rejects anything the analyzer
//! does not find acceptable.

use super::dna::{Nucleotide, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repeat length at or above which a sequence is considered low complexity
pub const LONG_REPEAT: usize = 6;
/// Minimum palindrome length reported by [`analyze`]
pub const MIN_PALINDROME: usize = 6;

/// Sequence complexity tier, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
    Genomic,
}

impl Complexity {
    pub fn name(&self) -> &'static str {
        match self {
            Complexity::Low => "Low",
            Complexity::Medium => "Medium",
            Complexity::High => "High",
            Complexity::Genomic => "Genomic",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full analysis report for a sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub complexity: Complexity,
    /// Shannon entropy in bits (max 2.0)
    pub entropy: f64,
    pub gc_content: f64,
    pub has_repeats: bool,
    pub longest_repeat: usize,
    pub has_palindrome: bool,
    /// Distinct codons when read in frame 0
    pub codon_diversity: usize,
    pub warnings: Vec<String>,
    pub acceptable: bool,
}

/// Shannon entropy over the A/T/G/C frequency distribution
pub fn entropy(seq: &Sequence) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let len = seq.len() as f64;
    seq.counts()
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Longest homopolymer run or period-2 repeat, in symbols
pub fn longest_repeat(seq: &Sequence) -> usize {
    let s = seq.symbols();
    let mut longest = 0usize;

    let mut run = 1usize;
    for i in 1..s.len() {
        if s[i] == s[i - 1] {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }

    // Dinucleotide repeats such as ATATAT, compared pairwise in steps of 2
    if s.len() >= 4 {
        let mut pairs = 1usize;
        let mut i = 2;
        while i + 1 < s.len() {
            if s[i] == s[i - 2] && s[i + 1] == s[i - 1] {
                pairs += 1;
                longest = longest.max(pairs * 2);
            } else {
                pairs = 1;
            }
            i += 2;
        }
    }

    longest
}

pub fn has_repeats(seq: &Sequence, min_run: usize) -> bool {
    seq.len() >= min_run && longest_repeat(seq) >= min_run
}

/// True if some window of at least `min_len` equals its own reverse complement
pub fn has_palindrome(seq: &Sequence, min_len: usize) -> bool {
    let s = seq.symbols();
    if min_len == 0 || s.len() < min_len {
        return false;
    }
    // A palindrome of length L contains one of length L-2 with the same
    // center, so windows of min_len and min_len+1 cover every longer case.
    (0..=s.len() - min_len).any(|start| {
        [min_len, min_len + 1]
            .into_iter()
            .filter(|&len| start + len <= s.len())
            .any(|len| is_palindrome(&s[start..start + len]))
    })
}

fn is_palindrome(window: &[Nucleotide]) -> bool {
    let len = window.len();
    (0..len / 2).all(|i| window[i].complement() == window[len - 1 - i])
}

/// Four-tier ladder; each tier is considered only after ruling out the lower ones
pub fn classify(seq: &Sequence) -> Complexity {
    let h = entropy(seq);
    if h < 1.0 || longest_repeat(seq) >= LONG_REPEAT {
        Complexity::Low
    } else if h < 1.5 || !seq.has_all_symbols() {
        Complexity::Medium
    } else if h < 1.9 {
        Complexity::High
    } else {
        Complexity::Genomic
    }
}

/// Distinct triplets read in consecutive non-overlapping frames
pub fn codon_diversity(seq: &Sequence) -> usize {
    let mut seen = [false; 64];
    for triplet in seq.symbols().chunks_exact(3) {
        let idx = (triplet[0].code() << 4 | triplet[1].code() << 2 | triplet[2].code()) as usize;
        seen[idx] = true;
    }
    seen.iter().filter(|&&s| s).count()
}

pub fn analyze(seq: &Sequence) -> Analysis {
    let complexity = classify(seq);
    let entropy = entropy(seq);
    let longest = longest_repeat(seq);
    let has_repeats = longest >= LONG_REPEAT;

    let mut warnings = Vec::new();
    if complexity == Complexity::Low {
        warnings.push("Low complexity sequence".to_string());
    }
    if has_repeats {
        warnings.push(format!("Contains long repeats ({} symbols)", longest));
    }
    if entropy < 1.5 {
        warnings.push(format!("Low entropy ({:.2} bits)", entropy));
    }
    if !seq.has_all_symbols() {
        warnings.push("Missing nucleotide types".to_string());
    }

    Analysis {
        complexity,
        entropy,
        gc_content: seq.gc_content(),
        has_repeats,
        longest_repeat: longest,
        has_palindrome: has_palindrome(seq, MIN_PALINDROME),
        codon_diversity: codon_diversity(seq),
        warnings,
        acceptable: complexity >= Complexity::Medium && !has_repeats && entropy >= 1.5,
    }
}
