//! Key Custody Service
//!
//! # Responsibilities
//!
//! - Generate server-custodied signature key pairs and seal the private half
//! - Register device-managed public keys
//! - Sign on a caller's behalf, only for keys this service holds
//! - Verify signatures with the algorithm recorded on the key

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::require_identity;
use crate::db::SharedStore;
use crate::pqc::{AlgorithmId, NegotiatedAlgorithms, PqcProvider};
use crate::types::{generate_id, CustodyMode, KeyCustody, KeyRecord, MessengerError, Result};

use super::crypto::{record_binding, CustodyKey};

/// Public half of a newly created server-custodied key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedKey {
    pub key_id: String,
    pub algorithm: AlgorithmId,
    /// base64
    pub public_key: String,
}

/// Public view of any key record. Never carries private material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key_id: String,
    pub owner_id: String,
    pub algorithm: AlgorithmId,
    /// base64
    pub public_key: String,
    pub custody: CustodyMode,
    /// hex SHA-256 of the raw public key
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl From<&KeyRecord> for KeyInfo {
    fn from(record: &KeyRecord) -> Self {
        Self {
            key_id: record.key_id.clone(),
            owner_id: record.owner_identity_id.clone(),
            algorithm: record.algorithm.clone(),
            public_key: record.public_key.clone(),
            custody: record.custody_mode(),
            fingerprint: record.fingerprint(),
            created_at: record.created_at,
        }
    }
}

pub struct KeyCustodyService {
    store: SharedStore,
    provider: Arc<dyn PqcProvider>,
    algorithms: Arc<NegotiatedAlgorithms>,
    custody_key: CustodyKey,
}

impl KeyCustodyService {
    pub fn new(
        store: SharedStore,
        provider: Arc<dyn PqcProvider>,
        algorithms: Arc<NegotiatedAlgorithms>,
        custody_key: CustodyKey,
    ) -> Self {
        Self {
            store,
            provider,
            algorithms,
            custody_key,
        }
    }

    /// Generate a server-custodied key for the session's identity.
    ///
    /// Asking for a backend key while also claiming on-device generation is
    /// contradictory and rejected.
    pub async fn generate(
        &self,
        session_token: Option<&str>,
        generate_on_device: bool,
    ) -> Result<GeneratedKey> {
        let identity = require_identity(self.store.as_ref(), session_token).await?;

        if generate_on_device {
            warn!(identity_id = %identity.id, "Refused backend key generation for on-device request");
            return Err(MessengerError::BadRequest(
                "Backend key generation cannot be combined with generate_on_device=true.".into(),
            ));
        }

        self.generate_for_identity(&identity.id).await
    }

    /// Algorithm used for new server-custodied keys
    pub fn signature_algorithm(&self) -> Result<AlgorithmId> {
        Ok(self.algorithms.signature()?.clone())
    }

    /// Generate and persist a server-custodied key for a known identity
    pub async fn generate_for_identity(&self, identity_id: &str) -> Result<GeneratedKey> {
        let (record, key) = self.prepare_for_identity(identity_id)?;
        self.store_prepared(record).await?;
        Ok(key)
    }

    /// Generate and seal a server-custodied key without persisting it.
    ///
    /// Lets registration finish the fallible crypto work before it writes
    /// anything.
    pub fn prepare_for_identity(&self, identity_id: &str) -> Result<(KeyRecord, GeneratedKey)> {
        let algorithm = self.signature_algorithm()?;
        let keypair = self.provider.generate_keypair(&algorithm)?;

        let key_id = generate_id();
        let sealed = self
            .custody_key
            .seal(&keypair.private_key, &record_binding(&key_id, &algorithm))?;
        let public_key = BASE64.encode(&keypair.public_key);

        let record = KeyRecord {
            key_id: key_id.clone(),
            owner_identity_id: identity_id.to_string(),
            algorithm: algorithm.clone(),
            public_key: public_key.clone(),
            custody: KeyCustody::ServerCustodied {
                private_key: sealed,
            },
            created_at: Utc::now(),
        };

        Ok((
            record,
            GeneratedKey {
                key_id,
                algorithm,
                public_key,
            },
        ))
    }

    /// Persist a key produced by [`prepare_for_identity`](Self::prepare_for_identity)
    pub async fn store_prepared(&self, record: KeyRecord) -> Result<()> {
        let identity_id = record.owner_identity_id.clone();
        let key_id = record.key_id.clone();
        let algorithm = record.algorithm.clone();
        let fingerprint = record.fingerprint();
        self.store.insert_key_record(record).await?;

        info!(
            identity_id = %identity_id,
            key_id = %key_id,
            algorithm = %algorithm,
            fingerprint = %fingerprint,
            "Generated server-custodied key"
        );
        Ok(())
    }

    /// Register a public key whose private half stays on the caller's device
    pub async fn register_device_key(
        &self,
        session_token: Option<&str>,
        algorithm: &str,
        public_key: &str,
    ) -> Result<KeyInfo> {
        let identity = require_identity(self.store.as_ref(), session_token).await?;

        let algorithm = AlgorithmId::new(algorithm.trim());
        if !self.provider.signature_algorithms().contains(&algorithm) {
            return Err(MessengerError::BadRequest(format!(
                "Unsupported signature algorithm: {}",
                algorithm
            )));
        }

        let public_key_bytes = BASE64.decode(public_key.trim())?;
        self.provider
            .validate_public_key(&algorithm, &public_key_bytes)?;

        let record = KeyRecord {
            key_id: generate_id(),
            owner_identity_id: identity.id.clone(),
            algorithm,
            public_key: BASE64.encode(&public_key_bytes),
            custody: KeyCustody::DeviceManaged,
            created_at: Utc::now(),
        };
        let info = KeyInfo::from(&record);
        self.store.insert_key_record(record).await?;

        info!(
            identity_id = %identity.id,
            key_id = %info.key_id,
            algorithm = %info.algorithm,
            fingerprint = %info.fingerprint,
            "Registered device-managed key"
        );

        Ok(info)
    }

    /// Public view of a key record
    pub async fn get_key(&self, key_id: &str) -> Result<KeyInfo> {
        self.find_record(key_id)
            .await?
            .as_ref()
            .map(KeyInfo::from)
            .ok_or_else(|| MessengerError::NotFound("Unknown public_key_id.".into()))
    }

    pub async fn find_record(&self, key_id: &str) -> Result<Option<KeyRecord>> {
        self.store.find_key_record_by_id(key_id).await
    }

    /// Sign with a key this service holds.
    ///
    /// Returns `Ok(None)` for a device-managed key; there is nothing to sign
    /// with and a signature must never be fabricated for it.
    pub fn sign(&self, record: &KeyRecord, message: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(sealed) = record.sealed_private_key() else {
            return Ok(None);
        };

        let private_key = self
            .custody_key
            .open(sealed, &record_binding(&record.key_id, &record.algorithm))?;
        let signature = self
            .provider
            .sign(&record.algorithm, &private_key, message)?;

        debug!(key_id = %record.key_id, "Signed with custodied key");
        Ok(Some(signature))
    }

    /// Verify a signature using the record's own algorithm
    pub fn verify(&self, record: &KeyRecord, message: &[u8], signature: &[u8]) -> Result<bool> {
        let public_key = record.public_key_bytes()?;
        Ok(self
            .provider
            .verify(&record.algorithm, &public_key, message, signature)?)
    }
}
