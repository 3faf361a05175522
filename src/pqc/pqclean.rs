//! PQClean-backed provider (via the `pqcrypto` crates)
//!
//! Supports Dilithium2/3/5 signatures and Kyber512/768/1024 encapsulation.
//! The ML-DSA / ML-KEM names in the default preference lists are not offered
//! here, so negotiation falls through to the Dilithium / Kyber entries.

use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _,
};
use zeroize::Zeroizing;

use super::{
    AlgorithmId, Encapsulation, KeyPair, PqcError, PqcProvider, DILITHIUM2, DILITHIUM3,
    DILITHIUM5, KYBER1024, KYBER512, KYBER768,
};

/// Expands `$body` with `$m` bound to the signature module named by `$alg`.
macro_rules! with_dilithium {
    ($alg:expr, $m:ident => $body:expr) => {
        match $alg.as_str() {
            DILITHIUM2 => {
                use pqcrypto_dilithium::dilithium2 as $m;
                $body
            }
            DILITHIUM3 => {
                use pqcrypto_dilithium::dilithium3 as $m;
                $body
            }
            DILITHIUM5 => {
                use pqcrypto_dilithium::dilithium5 as $m;
                $body
            }
            other => Err(PqcError::Unsupported(other.to_string())),
        }
    };
}

/// Expands `$body` with `$m` bound to the KEM module named by `$alg`.
macro_rules! with_kyber {
    ($alg:expr, $m:ident => $body:expr) => {
        match $alg.as_str() {
            KYBER512 => {
                use pqcrypto_kyber::kyber512 as $m;
                $body
            }
            KYBER768 => {
                use pqcrypto_kyber::kyber768 as $m;
                $body
            }
            KYBER1024 => {
                use pqcrypto_kyber::kyber1024 as $m;
                $body
            }
            other => Err(PqcError::Unsupported(other.to_string())),
        }
    };
}

fn bad_key(e: impl std::fmt::Debug) -> PqcError {
    PqcError::InvalidKey(format!("{:?}", e))
}

/// Provider backed by the PQClean reference implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PqcleanProvider;

impl PqcProvider for PqcleanProvider {
    fn name(&self) -> &'static str {
        "pqclean"
    }

    fn signature_algorithms(&self) -> Vec<AlgorithmId> {
        [DILITHIUM2, DILITHIUM3, DILITHIUM5]
            .into_iter()
            .map(AlgorithmId::from)
            .collect()
    }

    fn kem_algorithms(&self) -> Vec<AlgorithmId> {
        [KYBER512, KYBER768, KYBER1024]
            .into_iter()
            .map(AlgorithmId::from)
            .collect()
    }

    fn generate_keypair(&self, algorithm: &AlgorithmId) -> Result<KeyPair, PqcError> {
        with_dilithium!(algorithm, m => {
            let (pk, sk) = m::keypair();
            Ok(KeyPair {
                public_key: pk.as_bytes().to_vec(),
                private_key: Zeroizing::new(sk.as_bytes().to_vec()),
            })
        })
    }

    fn validate_public_key(
        &self,
        algorithm: &AlgorithmId,
        public_key: &[u8],
    ) -> Result<(), PqcError> {
        with_dilithium!(algorithm, m => {
            m::PublicKey::from_bytes(public_key).map(|_| ()).map_err(bad_key)
        })
    }

    fn sign(
        &self,
        algorithm: &AlgorithmId,
        private_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, PqcError> {
        with_dilithium!(algorithm, m => {
            let sk = m::SecretKey::from_bytes(private_key).map_err(bad_key)?;
            Ok(m::detached_sign(message, &sk).as_bytes().to_vec())
        })
    }

    fn verify(
        &self,
        algorithm: &AlgorithmId,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, PqcError> {
        with_dilithium!(algorithm, m => {
            let pk = m::PublicKey::from_bytes(public_key).map_err(bad_key)?;
            // Wrong-length signatures cannot match
            match m::DetachedSignature::from_bytes(signature) {
                Ok(sig) => Ok(m::verify_detached_signature(&sig, message, &pk).is_ok()),
                Err(_) => Ok(false),
            }
        })
    }

    fn generate_kem_keypair(&self, algorithm: &AlgorithmId) -> Result<KeyPair, PqcError> {
        with_kyber!(algorithm, m => {
            let (pk, sk) = m::keypair();
            Ok(KeyPair {
                public_key: pk.as_bytes().to_vec(),
                private_key: Zeroizing::new(sk.as_bytes().to_vec()),
            })
        })
    }

    fn encapsulate(
        &self,
        algorithm: &AlgorithmId,
        public_key: &[u8],
    ) -> Result<Encapsulation, PqcError> {
        with_kyber!(algorithm, m => {
            let pk = m::PublicKey::from_bytes(public_key).map_err(bad_key)?;
            let (ss, ct) = m::encapsulate(&pk);
            Ok(Encapsulation {
                shared_secret: Zeroizing::new(ss.as_bytes().to_vec()),
                ciphertext: ct.as_bytes().to_vec(),
            })
        })
    }

    fn decapsulate(
        &self,
        algorithm: &AlgorithmId,
        private_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, PqcError> {
        with_kyber!(algorithm, m => {
            let sk = m::SecretKey::from_bytes(private_key).map_err(bad_key)?;
            let ct = m::Ciphertext::from_bytes(ciphertext)
                .map_err(|e| PqcError::InvalidCiphertext(format!("{:?}", e)))?;
            let ss = m::decapsulate(&ct, &sk);
            Ok(Zeroizing::new(ss.as_bytes().to_vec()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alg(name: &str) -> AlgorithmId {
        AlgorithmId::from(name)
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let provider = PqcleanProvider;
        for name in [DILITHIUM2, DILITHIUM3, DILITHIUM5] {
            let keypair = provider.generate_keypair(&alg(name)).unwrap();
            let sig = provider
                .sign(&alg(name), &keypair.private_key, b"hello pqc")
                .unwrap();
            assert!(provider
                .verify(&alg(name), &keypair.public_key, b"hello pqc", &sig)
                .unwrap());
        }
    }

    #[test]
    fn test_verify_rejects_other_message() {
        let provider = PqcleanProvider;
        let keypair = provider.generate_keypair(&alg(DILITHIUM3)).unwrap();
        let sig = provider
            .sign(&alg(DILITHIUM3), &keypair.private_key, b"original")
            .unwrap();
        assert!(!provider
            .verify(&alg(DILITHIUM3), &keypair.public_key, b"tampered", &sig)
            .unwrap());
    }

    #[test]
    fn test_wrong_length_signature_is_false_not_error() {
        let provider = PqcleanProvider;
        let keypair = provider.generate_keypair(&alg(DILITHIUM3)).unwrap();
        let verdict = provider
            .verify(&alg(DILITHIUM3), &keypair.public_key, b"msg", b"fake-sig")
            .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_unsupported_algorithm() {
        let provider = PqcleanProvider;
        let err = provider
            .verify(&alg("Falcon-512"), b"pk", b"msg", b"sig")
            .unwrap_err();
        assert_eq!(err, PqcError::Unsupported("Falcon-512".into()));
    }

    #[test]
    fn test_validate_public_key_length() {
        let provider = PqcleanProvider;
        let keypair = provider.generate_keypair(&alg(DILITHIUM2)).unwrap();
        assert!(provider
            .validate_public_key(&alg(DILITHIUM2), &keypair.public_key)
            .is_ok());
        assert!(matches!(
            provider.validate_public_key(&alg(DILITHIUM2), b"short"),
            Err(PqcError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_kem_roundtrip() {
        let provider = PqcleanProvider;
        for name in [KYBER512, KYBER768, KYBER1024] {
            let keypair = provider.generate_kem_keypair(&alg(name)).unwrap();
            let enc = provider.encapsulate(&alg(name), &keypair.public_key).unwrap();
            assert!(!enc.ciphertext.is_empty());
            let secret = provider
                .decapsulate(&alg(name), &keypair.private_key, &enc.ciphertext)
                .unwrap();
            assert_eq!(*secret, *enc.shared_secret);
        }
    }

    #[test]
    fn test_decapsulate_rejects_truncated_ciphertext() {
        let provider = PqcleanProvider;
        let keypair = provider.generate_kem_keypair(&alg(KYBER768)).unwrap();
        let err = provider
            .decapsulate(&alg(KYBER768), &keypair.private_key, &[0u8; 8])
            .unwrap_err();
        assert!(matches!(err, PqcError::InvalidCiphertext(_)));
    }
}
