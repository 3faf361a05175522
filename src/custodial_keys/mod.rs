//! Key custody
//!
//! Every signature key is recorded with its custody mode fixed at creation:
//!
//! - **Server-custodied**: the private key is sealed under the service custody
//!   key and only unsealed inside [`KeyCustodyService::sign`]
//! - **Device-managed**: only the public key is known; the service can verify
//!   signatures for it but never produce one

pub mod crypto;
pub mod service;

pub use crypto::{CustodyKey, CUSTODY_KEY_LEN, NONCE_LEN};
pub use service::{GeneratedKey, KeyCustodyService, KeyInfo};
