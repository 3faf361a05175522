//! Records owned by the core services
//!
//! - [`Identity`] and [`Session`] belong to the credential store
//! - [`KeyRecord`] belongs to the key custody service
//! - [`Message`] belongs to the message integrity service
//!
//! Binary fields are kept in their base64 storage encoding and decoded at the
//! point of use.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::pqc::AlgorithmId;
use crate::types::{MessengerError, Result};

/// Random identifier for identities, keys and messages
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Identity / Session
// =============================================================================

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    /// Normalized (trimmed, lowercased); unique across the store
    pub email: String,
    pub display_name: String,
    /// PHC string, never the plaintext
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(email: String, display_name: String, password_hash: String) -> Self {
        Self {
            id: generate_id(),
            email,
            display_name,
            password_hash,
            created_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            user_id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Public view of an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity_id: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the session never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(token: String, identity_id: String, ttl_seconds: Option<u64>) -> Self {
        let created_at = Utc::now();
        let expires_at = ttl_seconds
            .and_then(|ttl| i64::try_from(ttl).ok())
            .map(|ttl| created_at + chrono::Duration::seconds(ttl));
        Self {
            token,
            identity_id,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

// =============================================================================
// Keys
// =============================================================================

/// A private key sealed under the service custody key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKey {
    /// base64 ChaCha20-Poly1305 ciphertext (key + tag)
    pub ciphertext: String,
    /// base64 12-byte nonce
    pub nonce: String,
}

/// Who holds the private half of a key pair.
///
/// Decided once when the record is created. A `DeviceManaged` record can
/// only ever be used to verify signatures the caller supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCustody {
    ServerCustodied { private_key: SealedKey },
    DeviceManaged,
}

/// Custody mode as reported to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyMode {
    Server,
    Device,
}

#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub key_id: String,
    pub owner_identity_id: String,
    pub algorithm: AlgorithmId,
    /// base64 public key
    pub public_key: String,
    pub custody: KeyCustody,
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    pub fn custody_mode(&self) -> CustodyMode {
        match self.custody {
            KeyCustody::ServerCustodied { .. } => CustodyMode::Server,
            KeyCustody::DeviceManaged => CustodyMode::Device,
        }
    }

    /// The sealed private key, if this service holds it
    pub fn sealed_private_key(&self) -> Option<&SealedKey> {
        match &self.custody {
            KeyCustody::ServerCustodied { private_key } => Some(private_key),
            KeyCustody::DeviceManaged => None,
        }
    }

    /// Decode the stored public key
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        BASE64.decode(&self.public_key).map_err(|e| {
            MessengerError::BadRequest(format!("Stored public key is not valid base64: {e}"))
        })
    }

    /// SHA-256 of the raw public key, hex encoded
    pub fn fingerprint(&self) -> String {
        match self.public_key_bytes() {
            Ok(bytes) => fingerprint(&bytes),
            Err(_) => String::new(),
        }
    }
}

/// SHA-256 fingerprint of raw key bytes, hex encoded
pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode(Sha256::digest(public_key))
}

// =============================================================================
// Messages
// =============================================================================

/// A sent message and its permanent verification verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub sender_id: String,
    /// Opaque; not validated against the identity store
    pub recipient_id: String,
    pub message_body: String,
    /// base64 signature that was verified (supplied or server-produced)
    pub signature: String,
    pub public_key_id: String,
    pub signature_valid: bool,
    pub created_at: DateTime<Utc>,
}
