//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for the identifiers that cross the tenancy boundary
//! (principals, households, sessions), so a user id can never be passed where a
//! household id is expected. Other records use plain string ids produced by
//! [`new_record_id`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::{Decode, Encode, Sqlite, Type};
use uuid::Uuid;

/// Fresh time-ordered identifier for any persisted record.
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// Macro to generate NewType ID wrappers with all required traits
macro_rules! domain_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new time-ordered ID
            pub fn new() -> Self {
                Self(new_record_id())
            }

            /// Create an ID from an existing string (for database retrieval)
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to inner string value
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
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
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        // SQLx trait implementations for database compatibility
        impl Type<Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <String as Type<Sqlite>>::type_info()
            }
        }

        impl<'q> Encode<'q, Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<IsNull, BoxDynError> {
                <String as Encode<'q, Sqlite>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, Sqlite> for $name {
            fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
                let s = <String as Decode<'r, Sqlite>>::decode(value)?;
                Ok(Self(s))
            }
        }
    };
}

domain_id!(
    /// Identifies a user account.
    UserId
);

domain_id!(
    /// Identifies a household, the unit of data ownership.
    HouseholdId
);

domain_id!(
    /// Identifies a cookie or bearer session.
    SessionId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let first = UserId::new();
        let second = UserId::new();
        assert_ne!(first, second);
        assert!(uuid::Uuid::parse_str(first.as_str()).is_ok());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = HouseholdId::from("h-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"h-1\"");
        let back: HouseholdId = serde_json::from_str("\"h-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_work_in_collections() {
        let mut set = HashSet::new();
        set.insert(SessionId::from("s-1"));
        assert!(set.contains(&SessionId::from("s-1")));
        assert_eq!(SessionId::from("s-1").to_string(), "s-1");
    }
}
