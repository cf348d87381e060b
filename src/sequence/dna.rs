//! Sequence — validated, normalized nucleotide strings
//!
//! Raw credential input is case-folded and stripped of whitespace, checked
//! against the 4-symbol alphabet and the configured length bounds, then
//! packed 2 bits per symbol. A parsed sequence is immutable.

use super::complexity::{self, Complexity};
use crate::crypto::EntropySource;
use crate::error::{EntropyError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four DNA bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    T,
    G,
    C,
}

impl Nucleotide {
    pub const ALL: [Nucleotide; 4] = [Nucleotide::A, Nucleotide::T, Nucleotide::G, Nucleotide::C];

    /// Case-insensitive parse of a single symbol
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Nucleotide::A),
            'T' => Some(Nucleotide::T),
            'G' => Some(Nucleotide::G),
            'C' => Some(Nucleotide::C),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Nucleotide::A => 'A',
            Nucleotide::T => 'T',
            Nucleotide::G => 'G',
            Nucleotide::C => 'C',
        }
    }

    /// 2-bit code: A=00, T=01, G=10, C=11
    pub fn code(self) -> u8 {
        match self {
            Nucleotide::A => 0b00,
            Nucleotide::T => 0b01,
            Nucleotide::G => 0b10,
            Nucleotide::C => 0b11,
        }
    }

    pub fn from_code(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Nucleotide::A,
            0b01 => Nucleotide::T,
            0b10 => Nucleotide::G,
            _ => Nucleotide::C,
        }
    }

    /// Watson–Crick pairing partner
    pub fn complement(self) -> Self {
        match self {
            Nucleotide::A => Nucleotide::T,
            Nucleotide::T => Nucleotide::A,
            Nucleotide::G => Nucleotide::C,
            Nucleotide::C => Nucleotide::G,
        }
    }

    pub fn is_purine(self) -> bool {
        matches!(self, Nucleotide::A | Nucleotide::G)
    }

    /// Same-class partner: A<->G, T<->C
    pub fn transition_partner(self) -> Self {
        match self {
            Nucleotide::A => Nucleotide::G,
            Nucleotide::G => Nucleotide::A,
            Nucleotide::T => Nucleotide::C,
            Nucleotide::C => Nucleotide::T,
        }
    }

    /// The two cross-class partners (purine <-> pyrimidine)
    pub fn transversion_partners(self) -> [Nucleotide; 2] {
        if self.is_purine() {
            [Nucleotide::T, Nucleotide::C]
        } else {
            [Nucleotide::A, Nucleotide::G]
        }
    }

    fn index(self) -> usize {
        self.code() as usize
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Accepted sequence length range (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceLimits {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for SequenceLimits {
    fn default() -> Self {
        Self { min_len: 12, max_len: 512 }
    }
}

/// A validated, normalized nucleotide sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    symbols: Vec<Nucleotide>,
    text: String,
    counts: [usize; 4],
    gc_content: f64,
    packed: Vec<u8>,
    complexity: Complexity,
}

/// Check raw input: empty, then length bounds, then alphabet
pub fn validate(raw: &str, limits: &SequenceLimits) -> Result<(), ValidationError> {
    let len = raw.chars().filter(|c| !c.is_whitespace()).count();
    if len == 0 {
        return Err(ValidationError::Empty);
    }
    if len < limits.min_len {
        return Err(ValidationError::TooShort { len, min: limits.min_len });
    }
    if len > limits.max_len {
        return Err(ValidationError::TooLong { len, max: limits.max_len });
    }
    let bad = raw
        .chars()
        .enumerate()
        .find(|&(_, c)| !c.is_whitespace() && Nucleotide::from_char(c).is_none());
    match bad {
        Some((position, symbol)) => Err(ValidationError::InvalidSymbol { symbol, position }),
        None => Ok(()),
    }
}

/// Strip whitespace and upper-case. Does not validate.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validate, normalize and build a [`Sequence`]
pub fn parse(raw: &str, limits: &SequenceLimits) -> Result<Sequence, ValidationError> {
    validate(raw, limits)?;
    let symbols: Vec<Nucleotide> = raw.chars().filter_map(Nucleotide::from_char).collect();
    Ok(Sequence::from_symbols(symbols))
}

impl Sequence {
    /// Build from already-valid symbols. Length bounds are the caller's concern.
    pub fn from_symbols(symbols: Vec<Nucleotide>) -> Self {
        let mut counts = [0usize; 4];
        let mut packed = vec![0u8; symbols.len().div_ceil(4)];
        for (i, n) in symbols.iter().enumerate() {
            counts[n.index()] += 1;
            let shift = (3 - (i % 4)) * 2;
            packed[i / 4] |= n.code() << shift;
        }
        let gc_content = if symbols.is_empty() {
            0.0
        } else {
            (counts[Nucleotide::G.index()] + counts[Nucleotide::C.index()]) as f64
                / symbols.len() as f64
        };
        let text = symbols.iter().map(|n| n.as_char()).collect();
        let mut seq = Self {
            symbols,
            text,
            counts,
            gc_content,
            packed,
            complexity: Complexity::Low,
        };
        seq.complexity = complexity::classify(&seq);
        seq
    }

    /// Build from normalized text produced by this crate (e.g. a stored generation)
    pub fn from_normalized(text: &str) -> Result<Self, ValidationError> {
        let mut symbols = Vec::with_capacity(text.len());
        for (position, c) in text.chars().enumerate() {
            let n = Nucleotide::from_char(c)
                .ok_or(ValidationError::InvalidSymbol { symbol: c, position })?;
            symbols.push(n);
        }
        if symbols.is_empty() {
            return Err(ValidationError::Empty);
        }
        Ok(Self::from_symbols(symbols))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Nucleotide] {
        &self.symbols
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn count(&self, n: Nucleotide) -> usize {
        self.counts[n.index()]
    }

    /// Counts in A, T, G, C order
    pub fn counts(&self) -> [usize; 4] {
        self.counts
    }

    pub fn gc_content(&self) -> f64 {
        self.gc_content
    }

    /// 4 symbols per byte, first symbol in the high bits
    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn complexity(&self) -> Complexity {
        self.complexity
    }

    pub fn has_all_symbols(&self) -> bool {
        self.counts.iter().all(|&c| c > 0)
    }

    pub fn complement(&self) -> String {
        self.symbols.iter().map(|n| n.complement().as_char()).collect()
    }

    pub fn reverse_complement(&self) -> String {
        self.symbols
            .iter()
            .rev()
            .map(|n| n.complement().as_char())
            .collect()
    }

    /// DNA -> RNA (T becomes U)
    pub fn transcribe(&self) -> String {
        self.text.replace('T', "U")
    }

    /// Unpack a packed buffer back into symbols
    pub fn unpack(packed: &[u8], len: usize) -> Vec<Nucleotide> {
        (0..len)
            .filter_map(|i| {
                let byte = packed.get(i / 4)?;
                let shift = (3 - (i % 4)) * 2;
                Some(Nucleotide::from_code(byte >> shift))
            })
            .collect()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Generate a random sequence from the secure source, clamped to `limits`
pub fn random_sequence(
    len: usize,
    limits: &SequenceLimits,
    entropy: &mut dyn EntropySource,
) -> Result<String, EntropyError> {
    let len = len.clamp(limits.min_len, limits.max_len);
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let idx = entropy.below(4)? as usize;
        out.push(Nucleotide::ALL[idx].as_char());
    }
    Ok(out)
}
