//! Authentication primitives
//!
//! Provides:
//! - Password hashing with Argon2id
//! - Opaque session token issuance and extraction
//! - Session resolution for authenticated operations

pub mod password;
pub mod session;
pub mod token;

pub use password::{PasswordHasher, PasswordParams};
pub use session::{require_identity, INVALID_TOKEN};
pub use token::{extract_bearer_token, generate_session_token, SESSION_TOKEN_BYTES};
