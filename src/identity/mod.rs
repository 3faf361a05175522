//! Identity Service
//!
//! Registration, login, logout and profile lookup. Every successful
//! registration and login issues a fresh session; earlier sessions for the
//! same identity stay valid.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::{generate_session_token, require_identity, PasswordHasher};
use crate::custodial_keys::KeyCustodyService;
use crate::db::memory::DUPLICATE_EMAIL;
use crate::db::SharedStore;
use crate::types::{normalize_email, Identity, IdentityProfile, MessengerError, Result, Session};

/// Same message for unknown email and wrong password
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

const MAX_PASSWORD_LEN: usize = 256;
const MAX_DISPLAY_NAME_LEN: usize = 128;

/// Result of a registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub user_id: String,
    pub auth_token: String,
    /// Present iff a server-custodied key was generated
    pub key_id: Option<String>,
    /// base64; present iff a server-custodied key was generated
    pub public_key: Option<String>,
}

/// Result of a login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSession {
    pub auth_token: String,
    pub user_profile: IdentityProfile,
}

pub struct IdentityService {
    store: SharedStore,
    hasher: Arc<PasswordHasher>,
    keys: Arc<KeyCustodyService>,
    session_ttl_seconds: Option<u64>,
}

impl IdentityService {
    pub fn new(
        store: SharedStore,
        hasher: Arc<PasswordHasher>,
        keys: Arc<KeyCustodyService>,
        session_ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            store,
            hasher,
            keys,
            session_ttl_seconds,
        }
    }

    /// Create an identity and its first session, and a server-custodied key
    /// unless the client generates its own on-device.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        generate_on_device: bool,
    ) -> Result<Registration> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;
        let display_name = validate_display_name(display_name)?;

        // No side effects before the duplicate check and the key pair exist
        if self.store.find_identity_by_email(&email).await?.is_some() {
            return Err(MessengerError::Conflict(DUPLICATE_EMAIL.into()));
        }

        let password_hash = self.hasher.hash(password)?;
        let identity = Identity::new(email, display_name, password_hash);
        let identity_id = identity.id.clone();

        let prepared = if generate_on_device {
            None
        } else {
            Some(self.keys.prepare_for_identity(&identity_id)?)
        };

        // Racing registrations are settled here by the store
        self.store.insert_identity(identity).await?;

        let (key_id, public_key) = match prepared {
            Some((record, key)) => {
                if let Err(e) = self.keys.store_prepared(record).await {
                    error!(
                        identity_id = %identity_id,
                        "Identity created but its server-custodied key was not stored: {}",
                        e
                    );
                    return Err(e);
                }
                (Some(key.key_id), Some(key.public_key))
            }
            None => (None, None),
        };

        let auth_token = self.issue_session(&identity_id).await?;

        info!(
            identity_id = %identity_id,
            server_key = key_id.is_some(),
            "Registered new identity"
        );

        Ok(Registration {
            user_id: identity_id,
            auth_token,
            key_id,
            public_key,
        })
    }

    /// Check credentials and issue a new session
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession> {
        let email = normalize_email(email);

        let Some(identity) = self.store.find_identity_by_email(&email).await? else {
            self.hasher.verify_dummy(password);
            warn!("Login failed");
            return Err(MessengerError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        if !self.hasher.verify(password, &identity.password_hash)? {
            warn!(identity_id = %identity.id, "Login failed");
            return Err(MessengerError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        let auth_token = self.issue_session(&identity.id).await?;
        info!(identity_id = %identity.id, "Login successful");

        Ok(LoginSession {
            auth_token,
            user_profile: identity.profile(),
        })
    }

    /// Revoke one session
    pub async fn logout(&self, session_token: Option<&str>) -> Result<()> {
        let identity = require_identity(self.store.as_ref(), session_token).await?;
        if let Some(token) = session_token {
            self.store.revoke_session(token.trim()).await?;
        }
        info!(identity_id = %identity.id, "Session revoked");
        Ok(())
    }

    /// Profile of the session's identity
    pub async fn me(&self, session_token: Option<&str>) -> Result<IdentityProfile> {
        Ok(require_identity(self.store.as_ref(), session_token)
            .await?
            .profile())
    }

    async fn issue_session(&self, identity_id: &str) -> Result<String> {
        let token = generate_session_token();
        self.store
            .insert_session(Session::new(
                token.clone(),
                identity_id.to_string(),
                self.session_ttl_seconds,
            ))
            .await?;
        Ok(token)
    }
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MessengerError::BadRequest("A valid email address is required.".into()))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() || password.chars().count() > MAX_PASSWORD_LEN {
        return Err(MessengerError::BadRequest(format!(
            "Password must be between 1 and {} characters.",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_display_name(display_name: &str) -> Result<String> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(MessengerError::BadRequest(format!(
            "Display name must be between 1 and {} characters.",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}
