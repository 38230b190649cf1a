use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading framework configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration layer could not be read.
    #[error("cannot read config layer {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A layer, or the merged tree, is not valid TOML for [`crate::Config`].
    #[error("cannot parse config layer {}: {source}", path.display())]
    Parse {
        /// File that failed to parse; `<defaults>` or `<merged>` for the
        /// embedded and merged trees.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file exceeds [`crate::loader::MAX_CONFIG_FILE_SIZE`].
    #[error("config layer {} is {size} bytes, limit is {limit}", path.display())]
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
        /// The limit in bytes.
        limit: u64,
    },

    /// A field holds a value the framework cannot use.
    #[error("invalid value for '{field}': {message}")]
    Invalid {
        /// Dotted field path, e.g. `framework.bootstrap_version`.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
