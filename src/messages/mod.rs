//! Message Integrity Service
//!
//! A send runs straight through, with no retries:
//!
//! 1. resolve the sender from the session token
//! 2. resolve the signing key record
//! 3. decode the record's public key
//! 4. take the supplied signature, or sign with the custodied key when the
//!    sender owns it
//! 5. verify with the record's algorithm
//! 6. persist the message with the verdict
//!
//! A signature that does not verify is not an error. The message is stored
//! with `signature_valid = false` so forgeries stay visible.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::require_identity;
use crate::custodial_keys::KeyCustodyService;
use crate::db::SharedStore;
use crate::types::{generate_id, Message, MessengerError, Result};

/// Outcome of a send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub signature_valid: bool,
}

/// What the caller asked to send
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage<'a> {
    pub recipient_id: &'a str,
    pub message_body: &'a str,
    pub public_key_id: &'a str,
    /// base64; blank counts as absent
    pub signature: Option<&'a str>,
}

pub struct MessageService {
    store: SharedStore,
    keys: Arc<KeyCustodyService>,
}

impl MessageService {
    pub fn new(store: SharedStore, keys: Arc<KeyCustodyService>) -> Self {
        Self { store, keys }
    }

    pub async fn send(
        &self,
        session_token: Option<&str>,
        outgoing: OutgoingMessage<'_>,
    ) -> Result<SendReceipt> {
        let sender = require_identity(self.store.as_ref(), session_token).await?;

        let record = self
            .keys
            .find_record(outgoing.public_key_id)
            .await?
            .ok_or_else(|| MessengerError::NotFound("Unknown public_key_id.".into()))?;

        // Surface a corrupt stored key before doing any signing work
        record.public_key_bytes()?;

        let body = outgoing.message_body.as_bytes();
        let supplied = outgoing.signature.map(str::trim).filter(|s| !s.is_empty());

        let signature = match supplied {
            Some(encoded) => BASE64.decode(encoded)?,
            // Only the owner may have the server sign with a custodied key
            None if record.owner_identity_id != sender.id => {
                warn!(
                    key_id = %record.key_id,
                    sender_id = %sender.id,
                    "Unsigned send with a key owned by another identity"
                );
                return Err(MessengerError::BadRequest(
                    "Signature required for a key the sender does not own.".into(),
                ));
            }
            None => self.keys.sign(&record, body)?.ok_or_else(|| {
                warn!(key_id = %record.key_id, "Unsigned send with a device-managed key");
                MessengerError::BadRequest("Signature required for client-managed key.".into())
            })?,
        };

        let signature_valid = self.keys.verify(&record, body, &signature)?;

        let message = Message {
            message_id: generate_id(),
            sender_id: sender.id.clone(),
            recipient_id: outgoing.recipient_id.to_string(),
            message_body: outgoing.message_body.to_string(),
            signature: BASE64.encode(&signature),
            public_key_id: record.key_id.clone(),
            signature_valid,
            created_at: Utc::now(),
        };
        let message_id = message.message_id.clone();
        self.store.insert_message(message).await?;

        if signature_valid {
            info!(
                message_id = %message_id,
                sender_id = %sender.id,
                key_id = %record.key_id,
                server_signed = supplied.is_none(),
                "Stored message with valid signature"
            );
        } else {
            warn!(
                message_id = %message_id,
                sender_id = %sender.id,
                key_id = %record.key_id,
                "Stored message with INVALID signature"
            );
        }

        Ok(SendReceipt {
            message_id,
            signature_valid,
        })
    }

    /// Fetch a message visible to the caller (its sender or recipient)
    pub async fn get_message(
        &self,
        session_token: Option<&str>,
        message_id: &str,
    ) -> Result<Message> {
        let caller = require_identity(self.store.as_ref(), session_token).await?;

        self.store
            .find_message_by_id(message_id)
            .await?
            .filter(|m| m.sender_id == caller.id || m.recipient_id == caller.id)
            .ok_or_else(|| MessengerError::NotFound("Unknown message_id.".into()))
    }
}
