//! Identity document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::Identity;

pub const IDENTITY_COLLECTION: &str = "identities";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IdentityDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub identity_id: String,

    /// Normalized email; unique
    pub email: String,

    pub display_name: String,

    /// Argon2id PHC string
    pub password_hash: String,
}

impl From<Identity> for IdentityDoc {
    fn from(identity: Identity) -> Self {
        Self {
            _id: None,
            metadata: Metadata::created(identity.created_at),
            identity_id: identity.id,
            email: identity.email,
            display_name: identity.display_name,
            password_hash: identity.password_hash,
        }
    }
}

impl From<IdentityDoc> for Identity {
    fn from(doc: IdentityDoc) -> Self {
        Self {
            created_at: doc.metadata.created_at_chrono(),
            id: doc.identity_id,
            email: doc.email,
            display_name: doc.display_name,
            password_hash: doc.password_hash,
        }
    }
}

impl IntoIndexes for IdentityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "identity_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("identity_id_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for IdentityDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
