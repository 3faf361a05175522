//! Post-quantum primitive provider
//!
//! The rest of the crate never calls a concrete PQC library directly. It asks a
//! [`PqcProvider`] for the algorithms it supports and hands it opaque byte
//! strings. Which algorithm gets used for new keys is decided once, at start-up,
//! by [`negotiate`] over the provider's capability set.
//!
//! # Algorithms
//!
//! - **Signatures**: ML-DSA / Dilithium family
//! - **KEM**: ML-KEM / Kyber family (not on the message path)

pub mod negotiate;
pub mod pqclean;

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub use negotiate::{negotiate, NegotiatedAlgorithms};
pub use pqclean::PqcleanProvider;

// =============================================================================
// Algorithm identifiers
// =============================================================================

pub const DILITHIUM2: &str = "Dilithium2";
pub const DILITHIUM3: &str = "Dilithium3";
pub const DILITHIUM5: &str = "Dilithium5";
pub const KYBER512: &str = "Kyber512";
pub const KYBER768: &str = "Kyber768";
pub const KYBER1024: &str = "Kyber1024";

/// Default signature preference: standardized names first, draft names after.
pub const DEFAULT_SIGNATURE_CANDIDATES: &[&str] =
    &["ML-DSA-65", DILITHIUM3, "ML-DSA-87", DILITHIUM5, "ML-DSA-44", DILITHIUM2];

/// Default KEM preference.
pub const DEFAULT_KEM_CANDIDATES: &[&str] = &["ML-KEM-768", KYBER768, "ML-KEM-1024", KYBER1024];

/// Name of a concrete PQC algorithm as reported by a provider.
///
/// Stored verbatim on every key record; verification always uses the
/// record's algorithm, never one supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(String);

impl AlgorithmId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma-separated preference list, dropping blanks
    pub fn parse_list(value: &str) -> Vec<AlgorithmId> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AlgorithmId::new)
            .collect()
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlgorithmId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Key material
// =============================================================================

/// A freshly generated key pair. The private half is zeroized on drop.
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Zeroizing<Vec<u8>>,
}

/// Result of a KEM encapsulation
pub struct Encapsulation {
    pub shared_secret: Zeroizing<Vec<u8>>,
    pub ciphertext: Vec<u8>,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PqcError {
    /// The provider does not implement this algorithm
    #[error("algorithm {0} is not supported by this provider")]
    Unsupported(String),

    /// None of the preferred candidates is supported
    #[error("no supported algorithm: {0}")]
    NoCandidate(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),
}

// =============================================================================
// Provider trait
// =============================================================================

/// Source of post-quantum key generation, signing and encapsulation.
///
/// All operations are synchronous and CPU-bound. A signature that does not
/// match (including one of the wrong length) is `Ok(false)` from [`verify`],
/// never an error; `Err(Unsupported)` is reserved for an algorithm the
/// provider cannot run at all.
///
/// [`verify`]: PqcProvider::verify
pub trait PqcProvider: Send + Sync {
    /// Human-readable provider name for logs
    fn name(&self) -> &'static str;

    /// Signature algorithms this provider can run
    fn signature_algorithms(&self) -> Vec<AlgorithmId>;

    /// KEM algorithms this provider can run
    fn kem_algorithms(&self) -> Vec<AlgorithmId>;

    fn generate_keypair(&self, algorithm: &AlgorithmId) -> Result<KeyPair, PqcError>;

    /// Check that `public_key` is well-formed for `algorithm`
    fn validate_public_key(&self, algorithm: &AlgorithmId, public_key: &[u8])
        -> Result<(), PqcError>;

    fn sign(
        &self,
        algorithm: &AlgorithmId,
        private_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, PqcError>;

    fn verify(
        &self,
        algorithm: &AlgorithmId,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, PqcError>;

    fn generate_kem_keypair(&self, algorithm: &AlgorithmId) -> Result<KeyPair, PqcError>;

    fn encapsulate(
        &self,
        algorithm: &AlgorithmId,
        public_key: &[u8],
    ) -> Result<Encapsulation, PqcError>;

    fn decapsulate(
        &self,
        algorithm: &AlgorithmId,
        private_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, PqcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_drops_blanks() {
        let list = AlgorithmId::parse_list(" ML-DSA-65, Dilithium3 ,,");
        assert_eq!(list, vec![AlgorithmId::from("ML-DSA-65"), AlgorithmId::from(DILITHIUM3)]);
    }

    #[test]
    fn test_algorithm_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&AlgorithmId::from(DILITHIUM3)).unwrap();
        assert_eq!(json, "\"Dilithium3\"");
    }
}
