//! Persistence collaborators
//!
//! The services only see the three store traits below. Two backends implement
//! all of them:
//!
//! - [`MemoryStore`]: dashmap-backed, process lifetime
//! - [`MongoStore`]: MongoDB collections with a unique email index
//!
//! Either way, email uniqueness is enforced atomically with the insert, and an
//! expired session resolves as unknown and is evicted on lookup.

pub mod memory;
pub mod mongo;
pub mod schemas;

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{Identity, KeyRecord, Message, Result, Session};

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoCollection, MongoStore};

/// Identities and their sessions
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new identity. Fails with `Conflict` if the normalized email is
    /// already taken, in which case nothing is written.
    async fn insert_identity(&self, identity: Identity) -> Result<()>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>>;

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>>;

    async fn insert_session(&self, session: Session) -> Result<()>;

    /// Resolve a session token to its identity. Unknown and expired tokens
    /// both return `None`; an expired session is removed.
    async fn find_identity_by_session_token(&self, token: &str) -> Result<Option<Identity>>;

    /// Remove one session. Returns whether it existed.
    async fn revoke_session(&self, token: &str) -> Result<bool>;
}

/// Signature key records
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn insert_key_record(&self, record: KeyRecord) -> Result<()>;

    async fn find_key_record_by_id(&self, key_id: &str) -> Result<Option<KeyRecord>>;
}

/// Sent messages with their verdicts
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: Message) -> Result<()>;

    async fn find_message_by_id(&self, message_id: &str) -> Result<Option<Message>>;
}

/// A backend implementing every store
pub trait Store: CredentialStore + KeyStore + MessageStore {}

impl<T: CredentialStore + KeyStore + MessageStore> Store for T {}

/// Shared handle to the configured backend
pub type SharedStore = Arc<dyn Store>;
