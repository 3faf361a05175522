//! Common metadata for all documents

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Creation, update and soft-deletion timestamps
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Metadata stamped with the given creation time
    pub fn created(at: chrono::DateTime<chrono::Utc>) -> Self {
        let at = DateTime::from_chrono(at);
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(at),
            created_at: Some(at),
        }
    }

    /// Creation time, falling back to now for documents written without one
    pub fn created_at_chrono(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
            .map(|dt| dt.to_chrono())
            .unwrap_or_else(chrono::Utc::now)
    }
}
