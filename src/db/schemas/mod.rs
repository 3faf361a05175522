//! MongoDB document schemas
//!
//! One document type per record, each converting to and from the domain
//! record in `crate::types`.

mod identity;
mod key_record;
mod message;
mod metadata;
mod session;

pub use identity::{IdentityDoc, IDENTITY_COLLECTION};
pub use key_record::{KeyRecordDoc, KEY_COLLECTION};
pub use message::{MessageDoc, MESSAGE_COLLECTION};
pub use metadata::Metadata;
pub use session::{SessionDoc, SESSION_COLLECTION};
