//! Trellis Core - the data model of the Trellis module runtime.
//!
//! This crate provides:
//! - Unit and revision identifiers
//! - Four-part [`Version`]s and [`VersionRange`]s
//! - Typed [`AttributeValue`]s and LDAP-style [`Filter`]s over them
//! - [`Capability`] and [`Requirement`], and the [`matches`] predicate
//!
//! Everything here is plain data plus pure predicates. Resolution and the
//! lifecycle live in `trellis-runtime`.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::prelude::*;
//!
//! let export = Capability::new(Namespace::Package)
//!     .with_attribute("package", "com.acme.util")
//!     .with_attribute("version", Version::new(1, 2, 0));
//!
//! let import = Requirement::with_filter(
//!     Namespace::Package,
//!     "(&(package=com.acme.util)(version>=1.0.0)(!(version>=2.0.0)))",
//! )
//! .unwrap();
//!
//! assert!(matches(&import, &export));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod capability;
mod error;
mod filter;
mod ids;
mod namespace;
mod value;
mod version;

pub use capability::{
    Capability, Cardinality, Requirement, Resolution, Visibility, attribute, directive, matches,
};
pub use error::{ModelError, ModelResult};
pub use filter::{Filter, escape_value};
pub use ids::{RevisionId, UnitId};
pub use namespace::Namespace;
pub use value::{AttributeValue, Attributes, CompareOp, Directives};
pub use version::{Version, VersionRange};
