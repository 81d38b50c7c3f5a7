//! Conversation sessions keyed by (creation time, user).

pub mod key;
pub mod store;

pub use key::SessionKey;
pub use store::{Session, SessionHandle, SessionStore};
