//! Nucleotide sequences — parsing, complexity analysis and codon translation
//!
//! A credential starts as raw text. It becomes a [`Sequence`] only after
//! validation and normalization, and is admitted as key material only if
//! the complexity analyzer accepts it.

mod codon;
mod complexity;
mod dna;

pub use codon::{translate, Codon, CodonTable, STOP};
pub use complexity::{
    analyze, classify, codon_diversity, entropy, has_palindrome, has_repeats, longest_repeat,
    Analysis, Complexity, LONG_REPEAT, MIN_PALINDROME,
};
pub use dna::{normalize, parse, random_sequence, validate, Nucleotide, Sequence, SequenceLimits};
