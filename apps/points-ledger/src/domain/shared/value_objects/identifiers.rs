//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up IDs from different contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a new unique identifier using UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(UserId, "Identifier of a loyalty program member.");
define_id!(WithdrawalId, "Unique identifier for a withdrawal ledger entry.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_new_and_display() {
        let id = UserId::new("user-42");
        assert_eq!(id.as_str(), "user-42");
        assert_eq!(format!("{id}"), "user-42");
    }

    #[test]
    fn withdrawal_id_generate_is_unique() {
        let id1 = WithdrawalId::generate();
        let id2 = WithdrawalId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn user_id_from_string() {
        let id: UserId = "alice".into();
        assert_eq!(id.as_str(), "alice");

        let id: UserId = String::from("bob").into();
        assert_eq!(id.as_str(), "bob");
    }

    #[test]
    fn user_id_serde_is_transparent() {
        let id = UserId::new("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
    }
}
