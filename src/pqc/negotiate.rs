//! Algorithm negotiation
//!
//! Picks the first candidate from an ordered preference list that the provider
//! reports as supported. Resolution happens once when the services are built;
//! the outcome (including "nothing available") is kept for the process lifetime.

use tracing::{error, info};

use super::{AlgorithmId, PqcError, PqcProvider};

/// Choose the first preferred algorithm present in `supported`.
pub fn negotiate(
    preferences: &[AlgorithmId],
    supported: &[AlgorithmId],
) -> Result<AlgorithmId, PqcError> {
    preferences
        .iter()
        .find(|candidate| supported.contains(candidate))
        .cloned()
        .ok_or_else(|| {
            let wanted: Vec<&str> = preferences.iter().map(AlgorithmId::as_str).collect();
            let available: Vec<&str> = supported.iter().map(AlgorithmId::as_str).collect();
            PqcError::NoCandidate(format!(
                "none of [{}] is available (provider offers [{}])",
                wanted.join(", "),
                available.join(", ")
            ))
        })
}

/// Signature and KEM algorithms resolved at start-up.
#[derive(Debug, Clone)]
pub struct NegotiatedAlgorithms {
    signature: Result<AlgorithmId, PqcError>,
    kem: Result<AlgorithmId, PqcError>,
}

impl NegotiatedAlgorithms {
    /// Resolve both preference lists against the provider's capability set.
    ///
    /// An unavailable algorithm is logged here and reported again on every
    /// operation that needs it.
    pub fn resolve(
        provider: &dyn PqcProvider,
        signature_preferences: &[AlgorithmId],
        kem_preferences: &[AlgorithmId],
    ) -> Self {
        let signature = negotiate(signature_preferences, &provider.signature_algorithms());
        let kem = negotiate(kem_preferences, &provider.kem_algorithms());

        match &signature {
            Ok(alg) => info!(provider = provider.name(), algorithm = %alg, "Selected signature algorithm"),
            Err(e) => error!(provider = provider.name(), "Signature algorithm unavailable: {}", e),
        }
        match &kem {
            Ok(alg) => info!(provider = provider.name(), algorithm = %alg, "Selected KEM algorithm"),
            Err(e) => error!(provider = provider.name(), "KEM algorithm unavailable: {}", e),
        }

        Self { signature, kem }
    }

    /// Algorithm for newly generated signature keys
    pub fn signature(&self) -> Result<&AlgorithmId, PqcError> {
        self.signature.as_ref().map_err(|e| e.clone())
    }

    /// Algorithm for newly generated KEM keys
    pub fn kem(&self) -> Result<&AlgorithmId, PqcError> {
        self.kem.as_ref().map_err(|e| e.clone())
    }
}
