//! Composite session identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one conversation: creation timestamp plus owning user.
///
/// Two requests carrying the same pair address the same history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    /// Unix timestamp (seconds) the caller assigned at session creation.
    pub created_at: i64,
    pub user_id: String,
}

impl SessionKey {
    pub fn new(created_at: i64, user_id: impl Into<String>) -> Self {
        Self {
            created_at,
            user_id: user_id.into(),
        }
    }

    /// Key for a session created now.
    pub fn now(user_id: impl Into<String>) -> Self {
        Self::new(chrono::Utc::now().timestamp(), user_id)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.created_at, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_timestamp_dash_user() {
        assert_eq!(SessionKey::new(1700000000, "alice").to_string(), "1700000000-alice");
    }

    #[test]
    fn structured_keys_do_not_collide_on_dashes() {
        // "1-2-x" could be read either way as a flat string.
        let a = SessionKey::new(1, "2-x");
        let b = SessionKey::new(12, "x");
        assert_ne!(a, b);
    }
}
