//! Session document schema
//!
//! `expires_at` carries a TTL index so MongoDB also reaps expired sessions on
//! its own schedule; lookups still check expiry themselves.

use std::time::Duration;

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::Session;

pub const SESSION_COLLECTION: &str = "sessions";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SessionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub token: String,

    pub identity_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,
}

impl From<Session> for SessionDoc {
    fn from(session: Session) -> Self {
        Self {
            _id: None,
            metadata: Metadata::created(session.created_at),
            token: session.token,
            identity_id: session.identity_id,
            expires_at: session.expires_at.map(DateTime::from_chrono),
        }
    }
}

impl From<SessionDoc> for Session {
    fn from(doc: SessionDoc) -> Self {
        Self {
            created_at: doc.metadata.created_at_chrono(),
            token: doc.token,
            identity_id: doc.identity_id,
            expires_at: doc.expires_at.map(|dt| dt.to_chrono()),
        }
    }
}

impl IntoIndexes for SessionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "token": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("token_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "expires_at": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(Duration::from_secs(0))
                        .name("expires_at_ttl".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SessionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
