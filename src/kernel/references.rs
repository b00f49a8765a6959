//! Reference liveness checks.
//!
//! Run inside the mutating transaction, after the write gate is held, so a
//! referenced record cannot be archived between the check and the commit.

use sqlx::SqliteConnection;

use crate::auth::authorization::Owner;
use crate::errors::{LarderError, Result};
use crate::storage::{records, Document};

/// A pointer from one record to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: &'static str,
    pub id: String,
    /// Wire name of the field holding the pointer.
    pub field: &'static str,
}

impl Reference {
    pub fn to<D: Document>(id: impl Into<String>, field: &'static str) -> Self {
        Self { kind: D::KIND, id: id.into(), field }
    }

    pub fn optional<D: Document>(id: Option<&String>, field: &'static str) -> Option<Self> {
        id.map(|id| Self::to::<D>(id.clone(), field))
    }
}

/// Unknown (or other-tenant) targets are `badRequest`; archived targets are `conflict`.
pub async fn verify(conn: &mut SqliteConnection, owner: &Owner, references: &[Reference]) -> Result<()> {
    for reference in references {
        let row = records::fetch_row(conn, reference.kind, &reference.id).await?;
        let row = match row {
            Some(row) => row,
            None => return Err(unknown(reference)),
        };

        if let Some(household_id) = &row.household_id {
            if owner.household_id().map(|h| h.as_str()) != Some(household_id.as_str()) {
                return Err(unknown(reference));
            }
        }

        if row.is_archived() {
            return Err(LarderError::conflict(
                format!("{} references archived {} '{}'", reference.field, reference.kind, reference.id),
                reference.kind,
            ));
        }
    }
    Ok(())
}

fn unknown(reference: &Reference) -> LarderError {
    LarderError::validation_field(
        format!("{} references unknown {} '{}'", reference.field, reference.kind, reference.id),
        reference.field,
    )
}
