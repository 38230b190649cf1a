//! Trellis Test - shared test utilities for the Trellis runtime.
//!
//! This crate provides manifest builders, recording activators and
//! framework constructors for use as a dev-dependency.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trellis_test::{ManifestBuilder, test_framework};
//!
//! #[tokio::test]
//! async fn test_install() {
//!     let framework = test_framework().await;
//!     let manifest = ManifestBuilder::unit("com.acme.util")
//!         .export("com.acme.util", "1.0.0")
//!         .build();
//!     let unit = framework.install("mem:util", &manifest, None).await.unwrap();
//!     framework.resolve(unit).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
