//! Session token resolution shared by every authenticated operation

use crate::db::CredentialStore;
use crate::types::{Identity, MessengerError, Result};

/// Message for any missing, unknown, expired or revoked token
pub const INVALID_TOKEN: &str = "Invalid or expired auth token.";

/// Resolve the caller's identity, or fail `Unauthorized`
pub async fn require_identity<S>(store: &S, token: Option<&str>) -> Result<Identity>
where
    S: CredentialStore + ?Sized,
{
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MessengerError::Unauthorized(INVALID_TOKEN.to_string()))?;

    store
        .find_identity_by_session_token(token)
        .await?
        .ok_or_else(|| MessengerError::Unauthorized(INVALID_TOKEN.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::types::Session;

    #[tokio::test]
    async fn test_require_identity() {
        let store = MemoryStore::new();
        let identity = Identity::new("a@example.com".into(), "A".into(), "hash".into());
        let id = identity.id.clone();
        store.insert_identity(identity).await.unwrap();
        store
            .insert_session(Session::new("good".into(), id.clone(), None))
            .await
            .unwrap();

        assert_eq!(require_identity(&store, Some("good")).await.unwrap().id, id);

        for token in [None, Some(""), Some("   "), Some("bogus")] {
            let err = require_identity(&store, token).await.unwrap_err();
            assert!(matches!(err, MessengerError::Unauthorized(_)));
            assert_eq!(err.to_string(), format!("Unauthorized: {INVALID_TOKEN}"));
        }
    }
}
