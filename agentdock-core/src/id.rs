//! Typed ID wrappers for the identifiers that cross component boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up a user id with an agent id, a session
/// id with a memory id, and so on. These are just strings underneath — no
/// UUID enforcement, no format requirement. Callers own ID generation.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(UserId, "Owning user of a memory record or recall query.");
typed_id!(AgentId, "Agent identifier within a (user, agent) memory pair.");
typed_id!(SessionId, "Unique identifier for a conversation session.");
typed_id!(MemoryId, "Unique identifier for a memory record.");
typed_id!(ToolId, "Unique identifier for a tool in the tool catalog.");
typed_id!(BatchId, "Identifier for an extraction batch.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_inner_string() {
        let id = UserId::new("alice");
        assert_eq!(id.to_string(), "alice");
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn empty_id_detected() {
        assert!(UserId::new("").is_empty());
        assert!(!UserId::new("x").is_empty());
    }
}
