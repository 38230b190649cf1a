//! Trellis Runtime - module resolution and revision lifecycle.
//!
//! This crate provides:
//! - A generational [`RevisionGraph`] of immutable unit revisions and their
//!   committed [`Wiring`]s
//! - A deterministic, all-or-nothing [`Resolver`] with fragment attachment,
//!   singleton exclusivity and execution environment checks
//! - The [`Framework`] lifecycle state machine: install, resolve, start,
//!   stop, update, uninstall and refresh
//! - A TOML [`ManifestTranslator`] and a persistent [`UnitStore`]
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis_config::FrameworkSection;
//! use trellis_runtime::prelude::*;
//!
//! # async fn example() -> RuntimeResult<()> {
//! let framework = Framework::open(FrameworkSection::default()).await?;
//!
//! let provider = framework
//!     .install(
//!         "file:util.toml",
//!         r#"
//!         [unit]
//!         symbolic-name = "com.acme.util"
//!         version = "1.0.0"
//!
//!         [[export]]
//!         package = "com.acme.util"
//!         version = "1.2.0"
//!         "#,
//!         None,
//!     )
//!     .await?;
//!
//! framework.start(provider).await?;
//! assert_eq!(framework.state(provider).await?, UnitState::Active);
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
pub mod resolver;
pub mod store;

mod activator;
mod error;
mod framework;
mod graph;
mod manifest;
mod refresh;
mod system;
mod unit;
mod wiring;

pub use activator::{Activator, UnitContext};
pub use error::{ResolveError, RuntimeError, RuntimeResult};
pub use framework::{Framework, FrameworkBuilder};
pub use graph::RevisionGraph;
pub use manifest::{ManifestTranslator, TomlManifestTranslator};
pub use refresh::RefreshReport;
pub use resolver::ee::EeToken;
pub use resolver::{
    BootstrapImport, Candidate, LateAttachment, ResolveOutcome, ResolveReport, Resolver,
    ResolverContext, ResolverHook, ResolverPolicy,
};
pub use store::UnitStore;
pub use system::{SYSTEM_LOCATION, SYSTEM_SYMBOLIC_NAME};
pub use unit::{Revision, RevisionKind, Translation, UnitInfo, UnitState};
pub use wiring::{HostedCapability, Wire, Wiring};
