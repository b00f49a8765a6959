//! Domain layer
//!
//! Infrastructure-free building blocks shared by every resource kind:
//! identifiers, record timestamps and pagination.

pub mod id;
pub mod pagination;

pub use id::{new_record_id, HouseholdId, SessionId, UserId};
pub use pagination::{Page, PageQuery, Pagination, SortDirection};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle timestamps carried by every persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn created(now: DateTime<Utc>) -> Self {
        Self { created_at: now, last_updated_at: None, archived_at: None }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_at = Some(now);
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.archived_at = Some(now);
        self.last_updated_at = Some(now);
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Error returned when a wire string does not name a variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl From<ParseEnumError> for crate::errors::LarderError {
    fn from(err: ParseEnumError) -> Self {
        crate::errors::LarderError::validation(err.to_string())
    }
}

/// Declare a closed set of wire strings as a Rust enum with `as_str`,
/// `Display`, `FromStr` and serde support.
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::ParseEnumError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::domain::ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::string_enum! {
        enum Flavor {
            Sweet => "sweet",
            Umami => "umami",
        }
    }

    #[test]
    fn string_enum_round_trips_wire_names() {
        assert_eq!("umami".parse::<Flavor>().unwrap(), Flavor::Umami);
        assert_eq!(Flavor::Sweet.to_string(), "sweet");
        assert_eq!(serde_json::to_string(&Flavor::Umami).unwrap(), "\"umami\"");
        assert_eq!(Flavor::ALL.len(), 2);

        let err = "bitter".parse::<Flavor>().unwrap_err();
        assert_eq!(err.to_string(), "invalid Flavor: bitter");
    }

    #[test]
    fn timestamps_track_lifecycle() {
        let now = chrono::Utc::now();
        let mut timestamps = Timestamps::created(now);
        assert!(!timestamps.is_archived());
        timestamps.archive(now);
        assert!(timestamps.is_archived());
        assert_eq!(timestamps.last_updated_at, Some(now));
    }
}
