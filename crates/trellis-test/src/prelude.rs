//! Prelude module - commonly used test helpers.
//!
//! Use `use trellis_test::prelude::*;` to import all essential helpers.

pub use crate::{
    ActivationLog, FailingActivator, ManifestBuilder, RecordingActivator, init_test_logging,
    stored_section, test_framework, test_section,
};
