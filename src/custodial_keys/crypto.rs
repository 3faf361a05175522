//! Sealing of server-custodied private keys
//!
//! # Algorithms
//!
//! - **Encryption**: ChaCha20-Poly1305 under a 32-byte service custody key
//! - **Binding**: the key id and algorithm are authenticated as associated
//!   data, so a sealed blob copied onto another record will not open
//!
//! Unsealed keys only ever live in [`Zeroizing`] buffers.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, Key, KeyInit, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::pqc::AlgorithmId;
use crate::types::{MessengerError, Result, SealedKey};

// =============================================================================
// Constants
// =============================================================================

/// Custody key length (32 bytes)
pub const CUSTODY_KEY_LEN: usize = 32;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Associated data binding a sealed key to its record
pub fn record_binding(key_id: &str, algorithm: &AlgorithmId) -> Vec<u8> {
    format!("pqc-messenger/key/{}/{}", key_id, algorithm).into_bytes()
}

// =============================================================================
// Custody key
// =============================================================================

/// Key-wrapping key held by the service
#[derive(Clone)]
pub struct CustodyKey {
    key: Zeroizing<[u8; CUSTODY_KEY_LEN]>,
}

impl CustodyKey {
    pub fn from_bytes(bytes: [u8; CUSTODY_KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(bytes),
        }
    }

    /// Fresh random key. Keys sealed under it do not survive a restart.
    pub fn random() -> Self {
        Self::from_bytes(generate_random_bytes())
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.as_slice()))
    }

    /// Seal a private key under a fresh nonce
    pub fn seal(&self, private_key: &[u8], binding: &[u8]) -> Result<SealedKey> {
        let nonce: [u8; NONCE_LEN] = generate_random_bytes();
        let ciphertext = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: private_key,
                    aad: binding,
                },
            )
            .map_err(|e| MessengerError::Internal(format!("Key sealing failed: {e}")))?;

        Ok(SealedKey {
            ciphertext: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce),
        })
    }

    /// Open a sealed private key.
    ///
    /// Any failure here means the stored record or the configured custody key
    /// is wrong, so it is reported as an internal error.
    pub fn open(&self, sealed: &SealedKey, binding: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let nonce = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| MessengerError::Internal(format!("Stored nonce is not base64: {e}")))?;
        if nonce.len() != NONCE_LEN {
            return Err(MessengerError::Internal(format!(
                "Invalid stored nonce length: expected {}, got {}",
                NONCE_LEN,
                nonce.len()
            )));
        }

        let ciphertext = BASE64.decode(&sealed.ciphertext).map_err(|e| {
            MessengerError::Internal(format!("Stored sealed key is not base64: {e}"))
        })?;

        self.cipher()
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: binding,
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| {
                MessengerError::Internal("Failed to unseal custodied key (wrong CUSTODY_KEY?)".into())
            })
    }
}

impl fmt::Debug for CustodyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustodyKey([REDACTED])")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> Vec<u8> {
        record_binding("key-1", &AlgorithmId::from("Dilithium3"))
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = CustodyKey::random();
        let secret = vec![0x42u8; 4000];

        let sealed = key.seal(&secret, &binding()).unwrap();
        let ciphertext = BASE64.decode(&sealed.ciphertext).unwrap();
        assert_eq!(ciphertext.len(), secret.len() + AUTH_TAG_LEN);

        let opened = key.open(&sealed, &binding()).unwrap();
        assert_eq!(*opened, secret);
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = CustodyKey::random();
        let a = key.seal(b"same", &binding()).unwrap();
        let b = key.seal(b"same", &binding()).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_custody_key_fails() {
        let sealed = CustodyKey::random().seal(b"secret", &binding()).unwrap();
        let result = CustodyKey::random().open(&sealed, &binding());
        assert!(matches!(result, Err(MessengerError::Internal(_))));
    }

    #[test]
    fn test_sealed_key_is_bound_to_record() {
        let key = CustodyKey::from_bytes([9u8; CUSTODY_KEY_LEN]);
        let sealed = key.seal(b"secret", &binding()).unwrap();

        let other = record_binding("key-2", &AlgorithmId::from("Dilithium3"));
        assert!(key.open(&sealed, &other).is_err());

        let downgraded = record_binding("key-1", &AlgorithmId::from("Dilithium2"));
        assert!(key.open(&sealed, &downgraded).is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let key = CustodyKey::from_bytes([1u8; CUSTODY_KEY_LEN]);
        assert_eq!(format!("{:?}", key), "CustodyKey([REDACTED])");
    }
}
