//! Model error types.

use thiserror::Error;

/// Errors raised while constructing model values.
///
/// Every variant is a construction-time failure: once a [`Requirement`]
/// or [`Capability`] exists, evaluating it never fails.
///
/// [`Requirement`]: crate::Requirement
/// [`Capability`]: crate::Capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A filter expression could not be parsed.
    #[error("invalid filter {filter:?} at offset {offset}: {reason}")]
    InvalidFilter {
        /// The offending filter text.
        filter: String,
        /// Byte offset where parsing stopped.
        offset: usize,
        /// What was expected.
        reason: String,
    },

    /// A version string could not be parsed.
    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion {
        /// The offending version text.
        version: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A version range could not be parsed.
    #[error("invalid version range {range:?}: {reason}")]
    InvalidVersionRange {
        /// The offending range text.
        range: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A directive carries a value outside its allowed set.
    #[error("invalid value {value:?} for directive {directive}")]
    InvalidDirective {
        /// Directive name.
        directive: String,
        /// The rejected value.
        value: String,
    },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
