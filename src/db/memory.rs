//! In-memory store
//!
//! Everything lives in `DashMap`s and disappears with the process. The email
//! index entry is held while the identity is written, so two concurrent
//! registrations for the same email serialize on that shard lock and exactly
//! one of them wins.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use super::{CredentialStore, KeyStore, MessageStore};
use crate::types::{Identity, KeyRecord, Message, MessengerError, Result, Session};

pub(crate) const DUPLICATE_EMAIL: &str = "A user with this email already exists.";

#[derive(Default)]
pub struct MemoryStore {
    identities: DashMap<String, Identity>,
    /// normalized email -> identity id
    email_index: DashMap<String, String>,
    sessions: DashMap<String, Session>,
    keys: DashMap<String, KeyRecord>,
    messages: DashMap<String, Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_identity(&self, identity: Identity) -> Result<()> {
        match self.email_index.entry(identity.email.clone()) {
            Entry::Occupied(_) => Err(MessengerError::Conflict(DUPLICATE_EMAIL.to_string())),
            Entry::Vacant(slot) => {
                let id = identity.id.clone();
                self.identities.insert(id.clone(), identity);
                slot.insert(id);
                Ok(())
            }
        }
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let id = self.email_index.get(email).map(|r| r.value().clone());
        Ok(id.and_then(|id| self.identities.get(&id).map(|r| r.value().clone())))
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>> {
        Ok(self.identities.get(id).map(|r| r.value().clone()))
    }

    async fn insert_session(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.token.clone(), session);
        Ok(())
    }

    async fn find_identity_by_session_token(&self, token: &str) -> Result<Option<Identity>> {
        let Some(session) = self.sessions.get(token).map(|r| r.value().clone()) else {
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            self.sessions.remove(token);
            debug!(identity_id = %session.identity_id, "Evicted expired session");
            return Ok(None);
        }

        self.find_identity_by_id(&session.identity_id).await
    }

    async fn revoke_session(&self, token: &str) -> Result<bool> {
        Ok(self.sessions.remove(token).is_some())
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn insert_key_record(&self, record: KeyRecord) -> Result<()> {
        self.keys.insert(record.key_id.clone(), record);
        Ok(())
    }

    async fn find_key_record_by_id(&self, key_id: &str) -> Result<Option<KeyRecord>> {
        Ok(self.keys.get(key_id).map(|r| r.value().clone()))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: Message) -> Result<()> {
        self.messages.insert(message.message_id.clone(), message);
        Ok(())
    }

    async fn find_message_by_id(&self, message_id: &str) -> Result<Option<Message>> {
        Ok(self.messages.get(message_id).map(|r| r.value().clone()))
    }
}
