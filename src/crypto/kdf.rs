//! Key derivation — salt ‖ sequence material through the digest provider

use super::{DigestProvider, Salt};
use crate::sequence::{CodonTable, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What part of the sequence feeds the digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivationMode {
    /// 2-bit packed nucleotides
    RawBinary,
    /// Amino-acid string from codon translation; synonymous codons derive the same key
    TranslatedProtein,
}

impl DerivationMode {
    pub fn name(&self) -> &'static str {
        match self {
            DerivationMode::RawBinary => "raw-binary",
            DerivationMode::TranslatedProtein => "translated-protein",
        }
    }
}

impl fmt::Display for DerivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase hex digest stored for a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub fn from_digest(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison over the hex text
    pub fn matches(&self, other: &CredentialHash) -> bool {
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic for identical inputs; all randomness lives in the salt
pub fn derive(
    seq: &Sequence,
    salt: &Salt,
    mode: DerivationMode,
    digest: &dyn DigestProvider,
    codons: &CodonTable,
) -> CredentialHash {
    let mut data = Vec::with_capacity(salt.as_bytes().len() + seq.len());
    data.extend_from_slice(salt.as_bytes());
    match mode {
        DerivationMode::RawBinary => data.extend_from_slice(seq.packed()),
        DerivationMode::TranslatedProtein => {
            data.extend_from_slice(codons.translate(seq).as_bytes())
        }
    }
    CredentialHash::from_digest(&digest.digest(&data))
}
