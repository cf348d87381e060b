//! Cryptographic collaborators — secure randomness, digests and key derivation
//!
//! The engine never generates randomness or hashes on its own: it goes
//! through [`EntropySource`] and [`DigestProvider`], so an embedder can plug
//! in a platform RNG or HSM. The defaults are the operating-system RNG and
//! SHA-256.

mod kdf;

pub use kdf::{derive, CredentialHash, DerivationMode};

use crate::error::EntropyError;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Salt length in bytes
pub const SALT_LEN: usize = 32;

/// Source of cryptographically secure random bytes
///
/// Implementations must fail with [`EntropyError`] rather than fall back
/// to a weaker generator.
pub trait EntropySource: Send + Sync {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError>;

    fn next_u32(&mut self) -> Result<u32, EntropyError> {
        let mut bytes = [0u8; 4];
        self.fill(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Uniform integer in `0..n` by rejection sampling (no modulo bias)
    fn below(&mut self, n: u32) -> Result<u32, EntropyError> {
        if n <= 1 {
            return Ok(0);
        }
        let limit = u32::MAX - (u32::MAX % n);
        loop {
            let v = self.next_u32()?;
            if v < limit {
                return Ok(v % n);
            }
        }
    }

    /// Uniform float in `[0, 1)`
    fn unit(&mut self) -> Result<f64, EntropyError> {
        Ok(self.next_u32()? as f64 / (u32::MAX as f64 + 1.0))
    }
}

/// Operating-system randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError::Unavailable(e.to_string()))
    }
}

/// Deterministic generator for tests and demos. Not for production credentials.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl EntropySource for SeededEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
        self.rng.fill_bytes(buf);
        Ok(())
    }
}

/// Fixed-output hash primitive
pub trait DigestProvider: Send + Sync {
    fn digest(&self, data: &[u8]) -> Vec<u8>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digest;

impl DigestProvider for Sha256Digest {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    fn name(&self) -> &'static str {
        "sha256"
    }
}

/// Per-key random salt
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Draw a fresh salt. An all-zero result is treated as a failed source.
    pub fn generate(entropy: &mut dyn EntropySource) -> Result<Self, EntropyError> {
        let mut bytes = [0u8; SALT_LEN];
        entropy.fill(&mut bytes)?;
        if bytes.iter().all(|&b| b == 0) {
            return Err(EntropyError::ZeroSalt);
        }
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({}…)", &hex::encode(self.0)[..8])
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_os_entropy_salt() {
        let mut os = OsEntropy;
        let a = Salt::generate(&mut os).unwrap();
        let b = Salt::generate(&mut os).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_broken_entropy_fails_loudly() {
        let mut broken = BrokenEntropy;
        assert!(matches!(
            Salt::generate(&mut broken),
            Err(EntropyError::Unavailable(_))
        ));
        assert!(broken.below(4).is_err());
    }

    #[test]
    fn test_zero_salt_rejected() {
        let mut zero = ZeroEntropy;
        assert!(matches!(Salt::generate(&mut zero), Err(EntropyError::ZeroSalt)));
    }

    #[test]
    fn test_below_and_unit_ranges() {
        let mut e = SeededEntropy::new(42);
        for _ in 0..1000 {
            assert!(e.below(5).unwrap() < 5);
            let u = e.unit().unwrap();
            assert!((0.0..1.0).contains(&u));
        }
        assert_eq!(e.below(1).unwrap(), 0);
        assert_eq!(e.below(0).unwrap(), 0);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = SeededEntropy::new(9);
        let mut b = SeededEntropy::new(9);
        assert_eq!(a.next_u32().unwrap(), b.next_u32().unwrap());
    }

    #[test]
    fn test_sha256_digest() {
        let d = Sha256Digest.digest(b"abc");
        assert_eq!(
            hex::encode(d),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
