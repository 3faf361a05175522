//! Key record document schema
//!
//! Custody is flattened into a `custody` tag plus optional sealed-key fields.
//! Reading back requires the tag and the fields to agree.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::pqc::AlgorithmId;
use crate::types::{CustodyMode, KeyCustody, KeyRecord, MessengerError, SealedKey};

pub const KEY_COLLECTION: &str = "key_records";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KeyRecordDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub key_id: String,
    pub owner_identity_id: String,
    pub algorithm: String,

    /// base64
    pub public_key: String,

    pub custody: CustodyMode,

    /// base64 ChaCha20-Poly1305 ciphertext; server custody only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sealed_private_key: Option<String>,

    /// base64 nonce; server custody only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_nonce: Option<String>,
}

impl Default for KeyRecordDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            key_id: String::new(),
            owner_identity_id: String::new(),
            algorithm: String::new(),
            public_key: String::new(),
            custody: CustodyMode::Device,
            sealed_private_key: None,
            private_key_nonce: None,
        }
    }
}

impl From<KeyRecord> for KeyRecordDoc {
    fn from(record: KeyRecord) -> Self {
        let custody = record.custody_mode();
        let (sealed_private_key, private_key_nonce) = match record.custody {
            KeyCustody::ServerCustodied { private_key } => {
                (Some(private_key.ciphertext), Some(private_key.nonce))
            }
            KeyCustody::DeviceManaged => (None, None),
        };

        Self {
            _id: None,
            metadata: Metadata::created(record.created_at),
            key_id: record.key_id,
            owner_identity_id: record.owner_identity_id,
            algorithm: record.algorithm.as_str().to_string(),
            public_key: record.public_key,
            custody,
            sealed_private_key,
            private_key_nonce,
        }
    }
}

impl TryFrom<KeyRecordDoc> for KeyRecord {
    type Error = MessengerError;

    fn try_from(doc: KeyRecordDoc) -> Result<Self, Self::Error> {
        let custody = match (doc.custody, doc.sealed_private_key, doc.private_key_nonce) {
            (CustodyMode::Server, Some(ciphertext), Some(nonce)) => KeyCustody::ServerCustodied {
                private_key: SealedKey { ciphertext, nonce },
            },
            (CustodyMode::Device, None, None) => KeyCustody::DeviceManaged,
            _ => {
                return Err(MessengerError::Database(format!(
                    "Key record {} has inconsistent custody fields",
                    doc.key_id
                )))
            }
        };

        Ok(Self {
            created_at: doc.metadata.created_at_chrono(),
            key_id: doc.key_id,
            owner_identity_id: doc.owner_identity_id,
            algorithm: AlgorithmId::new(doc.algorithm),
            public_key: doc.public_key,
            custody,
        })
    }
}

impl IntoIndexes for KeyRecordDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "key_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("key_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "owner_identity_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_identity_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for KeyRecordDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
