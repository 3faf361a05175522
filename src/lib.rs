//! PQC Messenger - identity, key custody and message integrity
//!
//! The security core of a messenger built on post-quantum signatures.
//!
//! ## Services
//!
//! - **Identity**: registration, login and opaque session tokens
//! - **Key custody**: server-custodied or device-managed signature keys
//! - **Message integrity**: verify (or sign, then verify) every message and
//!   record the verdict, including failures
//!
//! The PQC library sits behind [`pqc::PqcProvider`] and persistence behind the
//! [`db`] store traits, so both can be swapped without touching the services.

pub mod auth;
pub mod config;
pub mod custodial_keys;
pub mod db;
pub mod identity;
pub mod messages;
pub mod pqc;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use types::{MessengerError, Result};
