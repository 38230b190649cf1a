//! Trellis Telemetry - logging setup for the Trellis module runtime.
//!
//! Every Trellis crate logs through `tracing` macros; this crate installs the
//! subscriber that formats and routes those records.
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), trellis_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_resolver_decisions();
//!
//! setup_logging(&config)?;
//! tracing::info!("framework starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, RESOLVER_TARGET,
    setup_default_logging, setup_logging,
};
