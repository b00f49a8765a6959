//! # Error Handling
//!
//! Error handling for the Larder service: the [`LarderError`] taxonomy, the
//! crate-wide [`Result`] alias and an [`ErrorContext`] extension for attaching
//! context while propagating with `?`.

pub mod types;

pub use types::{AuthErrorType, ErrorCode, LarderError, Result};

/// Short alias used across the crate.
pub type Error = LarderError;

/// Attach human-readable context to a failing result.
pub trait ErrorContext<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|mut err| {
            err.add_context(context.into());
            err
        })
    }
}
