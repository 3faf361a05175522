//! Message document schema
//!
//! The send time is `metadata.created_at`.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::Message;

pub const MESSAGE_COLLECTION: &str = "messages";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MessageDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub message_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub message_body: String,
    /// base64
    pub signature: String,
    pub public_key_id: String,
    pub signature_valid: bool,
}

impl From<Message> for MessageDoc {
    fn from(message: Message) -> Self {
        Self {
            _id: None,
            metadata: Metadata::created(message.created_at),
            message_id: message.message_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            message_body: message.message_body,
            signature: message.signature,
            public_key_id: message.public_key_id,
            signature_valid: message.signature_valid,
        }
    }
}

impl From<MessageDoc> for Message {
    fn from(doc: MessageDoc) -> Self {
        Self {
            message_id: doc.message_id,
            sender_id: doc.sender_id,
            recipient_id: doc.recipient_id,
            message_body: doc.message_body,
            signature: doc.signature,
            public_key_id: doc.public_key_id,
            signature_valid: doc.signature_valid,
            created_at: doc.metadata.created_at_chrono(),
        }
    }
}

impl IntoIndexes for MessageDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "message_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("message_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "sender_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("sender_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "recipient_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("recipient_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for MessageDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
