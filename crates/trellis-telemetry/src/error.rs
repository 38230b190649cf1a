//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log format name is not one of `pretty`, `compact`, `json`, `full`.
    #[error("unknown log format '{0}'")]
    UnknownFormat(String),

    /// The level or a directive is not a valid `EnvFilter` directive.
    #[error("invalid log directive '{directive}': {message}")]
    InvalidDirective {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("log subscriber already installed: {0}")]
    AlreadyInitialized(String),

    /// The log directory could not be created.
    #[error("cannot create log directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
