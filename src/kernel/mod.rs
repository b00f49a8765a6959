//! Resource Lifecycle Kernel.
//!
//! Every entity kind implements [`Resource`] (and usually [`Creatable`] and
//! [`Patchable`]) and gets the uniform create/get/list/update/archive/exists/
//! search contract from [`Kernel`]. Ownership is enforced through the
//! authorization evaluator, references are checked inside the mutating
//! transaction, and every transition is journaled.

pub mod events;
pub mod lifecycle;
pub mod references;

pub use events::{ChangeEvent, ChangeFeed};
pub use lifecycle::Kernel;
pub use references::Reference;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::errors::Result;
use crate::storage::Document;

/// Where records of a kind live by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    User,
    Household,
}

/// A persisted entity managed by the kernel.
pub trait Resource: Document {
    /// camelCase noun used in journal event types (`webhook` -> `webhookCreated`).
    const NOUN: &'static str;
    const SCOPE: Scope;

    fn owner(&self) -> Owner;

    /// Records this one points at; checked on every create and update.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}

/// Everything `from_input` needs besides the input itself.
#[derive(Debug)]
pub struct CreateContext<'a> {
    pub id: String,
    pub owner: Owner,
    pub parent_id: Option<String>,
    pub now: DateTime<Utc>,
    pub session: &'a SessionContext,
}

/// A resource clients create through the kernel.
pub trait Creatable: Resource {
    type Input: DeserializeOwned + Validate + Send + 'static;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self>;
}

/// A resource with a typed partial update. Absent patch fields leave the
/// record unchanged.
pub trait Patchable: Resource {
    type Patch: DeserializeOwned + Validate + Send + 'static;

    fn apply_patch(&mut self, patch: Self::Patch, session: &SessionContext) -> Result<()>;
}

/// Apply `Some` values of a patch field.
pub fn patch_field<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Normalised key for name-based uniqueness and search.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
