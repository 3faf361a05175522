//! Shared types for the messenger core

pub mod error;
pub mod records;

pub use error::{MessengerError, Result};
pub use records::{
    fingerprint, generate_id, normalize_email, CustodyMode, Identity, IdentityProfile,
    KeyCustody, KeyRecord, Message, SealedKey, Session,
};
