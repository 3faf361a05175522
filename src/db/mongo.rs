//! MongoDB client, typed collections and the Mongo-backed store

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::memory::DUPLICATE_EMAIL;
use super::schemas::{
    IdentityDoc, KeyRecordDoc, MessageDoc, Metadata, SessionDoc, IDENTITY_COLLECTION,
    KEY_COLLECTION, MESSAGE_COLLECTION, SESSION_COLLECTION,
};
use super::{CredentialStore, KeyStore, MessageStore};
use crate::types::{Identity, KeyRecord, Message, MessengerError, Result, Session};

/// Schemas that declare their own indexes
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Schemas carrying [`Metadata`]
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Duplicate key (E11000) on a unique index
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        return write_error.code == 11000;
    }
    err.to_string().contains("E11000")
}

// =============================================================================
// Client / collections
// =============================================================================

#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB");

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            MessengerError::Database(format!("Failed to connect to MongoDB: {}", e))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MessengerError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }
}

/// Typed collection with schema indexes applied on creation
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
    name: String,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = MongoCollection {
            inner: client.database(db_name).collection::<T>(collection_name),
            name: collection_name.to_string(),
        };
        collection.apply_indexes().await?;
        Ok(collection)
    }

    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();
        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner.create_indexes(indices).await.map_err(|e| {
            MessengerError::Database(format!("Failed to create indexes on {}: {}", self.name, e))
        })?;

        Ok(())
    }

    /// Insert a document. A unique-index violation is `Conflict`.
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at.get_or_insert(now);
        metadata.updated_at = Some(now);

        let result = self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                MessengerError::Conflict(format!("Duplicate key in {}", self.name))
            } else {
                MessengerError::Database(format!("Insert into {} failed: {}", self.name, e))
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| MessengerError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live (not soft-deleted) document
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| MessengerError::Database(format!("Find in {} failed: {}", self.name, e)))
    }

    /// Soft delete one document. Returns whether a live document matched.
    pub async fn soft_delete(&self, filter: Document) -> Result<bool> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            }
        };

        let result = self
            .inner
            .update_one(full_filter, update)
            .await
            .map_err(|e| MessengerError::Database(format!("Update in {} failed: {}", self.name, e)))?;

        Ok(result.modified_count > 0)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by four MongoDB collections
#[derive(Clone)]
pub struct MongoStore {
    identities: MongoCollection<IdentityDoc>,
    sessions: MongoCollection<SessionDoc>,
    keys: MongoCollection<KeyRecordDoc>,
    messages: MongoCollection<MessageDoc>,
}

impl MongoStore {
    /// Connect and make sure every collection has its indexes
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = MongoClient::new(uri, db_name).await?;
        Ok(Self {
            identities: client.collection(IDENTITY_COLLECTION).await?,
            sessions: client.collection(SESSION_COLLECTION).await?,
            keys: client.collection(KEY_COLLECTION).await?,
            messages: client.collection(MESSAGE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl CredentialStore for MongoStore {
    async fn insert_identity(&self, identity: Identity) -> Result<()> {
        // The unique email index is the arbiter between racing registrations
        self.identities
            .insert_one(IdentityDoc::from(identity))
            .await
            .map_err(|e| match e {
                MessengerError::Conflict(_) => {
                    MessengerError::Conflict(DUPLICATE_EMAIL.to_string())
                }
                other => other,
            })?;
        Ok(())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let doc = self.identities.find_one(doc! { "email": email }).await?;
        Ok(doc.map(Identity::from))
    }

    async fn find_identity_by_id(&self, id: &str) -> Result<Option<Identity>> {
        let doc = self.identities.find_one(doc! { "identity_id": id }).await?;
        Ok(doc.map(Identity::from))
    }

    async fn insert_session(&self, session: Session) -> Result<()> {
        self.sessions.insert_one(SessionDoc::from(session)).await?;
        Ok(())
    }

    async fn find_identity_by_session_token(&self, token: &str) -> Result<Option<Identity>> {
        let Some(doc) = self.sessions.find_one(doc! { "token": token }).await? else {
            return Ok(None);
        };
        let session = Session::from(doc);

        if session.is_expired_at(Utc::now()) {
            self.sessions.soft_delete(doc! { "token": token }).await?;
            debug!(identity_id = %session.identity_id, "Evicted expired session");
            return Ok(None);
        }

        self.find_identity_by_id(&session.identity_id).await
    }

    async fn revoke_session(&self, token: &str) -> Result<bool> {
        self.sessions.soft_delete(doc! { "token": token }).await
    }
}

#[async_trait]
impl KeyStore for MongoStore {
    async fn insert_key_record(&self, record: KeyRecord) -> Result<()> {
        self.keys.insert_one(KeyRecordDoc::from(record)).await?;
        Ok(())
    }

    async fn find_key_record_by_id(&self, key_id: &str) -> Result<Option<KeyRecord>> {
        self.keys
            .find_one(doc! { "key_id": key_id })
            .await?
            .map(KeyRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl MessageStore for MongoStore {
    async fn insert_message(&self, message: Message) -> Result<()> {
        self.messages.insert_one(MessageDoc::from(message)).await?;
        Ok(())
    }

    async fn find_message_by_id(&self, message_id: &str) -> Result<Option<Message>> {
        let doc = self
            .messages
            .find_one(doc! { "message_id": message_id })
            .await?;
        Ok(doc.map(Message::from))
    }
}

