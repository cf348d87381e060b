//! Codon table — the standard genetic code as a 64-entry lookup
//!
//! Each triplet's 6-bit index is its three 2-bit nucleotide codes,
//! first symbol in the high bits.

use super::dna::{Nucleotide, Sequence};
use std::sync::OnceLock;

const STANDARD_CODE: [(&str, char, &str); 64] = [
    ("TTT", 'F', "Phenylalanine"), ("TTC", 'F', "Phenylalanine"),
    ("TTA", 'L', "Leucine"), ("TTG", 'L', "Leucine"),
    ("CTT", 'L', "Leucine"), ("CTC", 'L', "Leucine"),
    ("CTA", 'L', "Leucine"), ("CTG", 'L', "Leucine"),
    ("ATT", 'I', "Isoleucine"), ("ATC", 'I', "Isoleucine"), ("ATA", 'I', "Isoleucine"),
    ("ATG", 'M', "Methionine"),
    ("GTT", 'V', "Valine"), ("GTC", 'V', "Valine"),
    ("GTA", 'V', "Valine"), ("GTG", 'V', "Valine"),
    ("TCT", 'S', "Serine"), ("TCC", 'S', "Serine"),
    ("TCA", 'S', "Serine"), ("TCG", 'S', "Serine"),
    ("AGT", 'S', "Serine"), ("AGC", 'S', "Serine"),
    ("CCT", 'P', "Proline"), ("CCC", 'P', "Proline"),
    ("CCA", 'P', "Proline"), ("CCG", 'P', "Proline"),
    ("ACT", 'T', "Threonine"), ("ACC", 'T', "Threonine"),
    ("ACA", 'T', "Threonine"), ("ACG", 'T', "Threonine"),
    ("GCT", 'A', "Alanine"), ("GCC", 'A', "Alanine"),
    ("GCA", 'A', "Alanine"), ("GCG", 'A', "Alanine"),
    ("TAT", 'Y', "Tyrosine"), ("TAC", 'Y', "Tyrosine"),
    ("TAA", '*', "Stop"), ("TAG", '*', "Stop"), ("TGA", '*', "Stop"),
    ("CAT", 'H', "Histidine"), ("CAC", 'H', "Histidine"),
    ("CAA", 'Q', "Glutamine"), ("CAG", 'Q', "Glutamine"),
    ("AAT", 'N', "Asparagine"), ("AAC", 'N', "Asparagine"),
    ("AAA", 'K', "Lysine"), ("AAG", 'K', "Lysine"),
    ("GAT", 'D', "Aspartic Acid"), ("GAC", 'D', "Aspartic Acid"),
    ("GAA", 'E', "Glutamic Acid"), ("GAG", 'E', "Glutamic Acid"),
    ("TGT", 'C', "Cysteine"), ("TGC", 'C', "Cysteine"),
    ("TGG", 'W', "Tryptophan"),
    ("CGT", 'R', "Arginine"), ("CGC", 'R', "Arginine"),
    ("CGA", 'R', "Arginine"), ("CGG", 'R', "Arginine"),
    ("AGA", 'R', "Arginine"), ("AGG", 'R', "Arginine"),
    ("GGT", 'G', "Glycine"), ("GGC", 'G', "Glycine"),
    ("GGA", 'G', "Glycine"), ("GGG", 'G', "Glycine"),
];

/// Amino-acid letter used for stop codons
pub const STOP: char = '*';

/// One entry of the genetic code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codon {
    pub triplet: [Nucleotide; 3],
    /// 6-bit index, 0..64
    pub value: u8,
    pub amino_acid: char,
    pub amino_name: &'static str,
    pub is_stop: bool,
}

/// Read-only triplet -> amino acid table
#[derive(Debug)]
pub struct CodonTable {
    entries: [Codon; 64],
}

static STANDARD: OnceLock<CodonTable> = OnceLock::new();

fn index_of(triplet: [Nucleotide; 3]) -> usize {
    ((triplet[0].code() << 4) | (triplet[1].code() << 2) | triplet[2].code()) as usize
}

impl CodonTable {
    /// The process-wide standard table, built on first use
    pub fn standard() -> &'static CodonTable {
        STANDARD.get_or_init(CodonTable::build)
    }

    fn build() -> Self {
        let placeholder = Codon {
            triplet: [Nucleotide::A; 3],
            value: 0,
            amino_acid: '?',
            amino_name: "",
            is_stop: false,
        };
        let mut entries = [placeholder; 64];
        for (text, amino, name) in STANDARD_CODE {
            let mut triplet = [Nucleotide::A; 3];
            for (slot, c) in triplet.iter_mut().zip(text.chars()) {
                // The literal table only contains valid symbols
                *slot = Nucleotide::from_char(c).unwrap_or(Nucleotide::A);
            }
            let idx = index_of(triplet);
            entries[idx] = Codon {
                triplet,
                value: idx as u8,
                amino_acid: amino,
                amino_name: name,
                is_stop: amino == STOP,
            };
        }
        Self { entries }
    }

    pub fn get(&self, triplet: [Nucleotide; 3]) -> &Codon {
        &self.entries[index_of(triplet)]
    }

    /// Look up a textual triplet such as `"atg"`
    pub fn lookup(&self, triplet: &str) -> Option<&Codon> {
        let mut chars = triplet.chars().filter(|c| !c.is_whitespace());
        let a = Nucleotide::from_char(chars.next()?)?;
        let b = Nucleotide::from_char(chars.next()?)?;
        let c = Nucleotide::from_char(chars.next()?)?;
        if chars.next().is_some() {
            return None;
        }
        Some(self.get([a, b, c]))
    }

    pub fn amino_for(&self, triplet: &str) -> Option<char> {
        self.lookup(triplet).map(|c| c.amino_acid)
    }

    /// Two codons are synonymous when they encode the same amino acid
    pub fn synonymous(&self, a: &str, b: &str) -> bool {
        match (self.amino_for(a), self.amino_for(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Translate in consecutive non-overlapping triplets; a trailing partial codon is dropped
    pub fn translate(&self, seq: &Sequence) -> String {
        seq.symbols()
            .chunks_exact(3)
            .map(|t| self.get([t[0], t[1], t[2]]).amino_acid)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Codon> {
        self.entries.iter()
    }
}

/// Translate with the standard table
pub fn translate(seq: &Sequence) -> String {
    CodonTable::standard().translate(seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{parse, SequenceLimits};

    #[test]
    fn test_table_is_complete() {
        let table = CodonTable::standard();
        assert_eq!(table.iter().count(), 64);
        assert!(table.iter().all(|c| c.amino_acid != '?'));
        assert_eq!(table.iter().filter(|c| c.is_stop).count(), 3);
        for (i, c) in table.iter().enumerate() {
            assert_eq!(c.value as usize, i);
        }
    }

    #[test]
    fn test_lookup() {
        let table = CodonTable::standard();
        assert_eq!(table.amino_for("ATG"), Some('M'));
        assert_eq!(table.amino_for("tgg"), Some('W'));
        assert_eq!(table.amino_for("TAA"), Some(STOP));
        assert_eq!(table.lookup("ATG").map(|c| c.amino_name), Some("Methionine"));
        assert_eq!(table.amino_for("AT"), None);
        assert_eq!(table.amino_for("ATGC"), None);
        assert_eq!(table.amino_for("AXG"), None);
    }

    #[test]
    fn test_synonymous() {
        let table = CodonTable::standard();
        assert!(table.synonymous("CTT", "TTA"));
        assert!(table.synonymous("TAA", "TGA"));
        assert!(!table.synonymous("ATG", "TGG"));
    }

    #[test]
    fn test_translate_drops_remainder() {
        let seq = parse("ATGGCCAAGTGATT", &SequenceLimits::default()).unwrap();
        assert_eq!(translate(&seq), "MAK*");
    }
}
