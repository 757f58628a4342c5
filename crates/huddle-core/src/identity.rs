//! Authenticated user identity.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// An authenticated user as vouched for by the account service.
///
/// Built once at login and never mutated afterwards; the relay uses
/// `username` verbatim as the connection's display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: UserId,
    username: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    /// The user's primary key.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// The user's display name.
    pub fn username(&self) -> &str {
        &self.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let identity = Identity::new(UserId::new(7), "ada");
        assert_eq!(identity.id(), UserId::new(7));
        assert_eq!(identity.username(), "ada");
    }

    #[test]
    fn serializes_flat() {
        let identity = Identity::new(UserId::new(3), "grace");
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["username"], "grace");
    }
}
