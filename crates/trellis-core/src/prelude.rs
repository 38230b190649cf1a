//! Prelude module - commonly used types for convenient import.
//!
//! Use `use trellis_core::prelude::*;` to import all essential types.

pub use crate::{
    AttributeValue, Attributes, Capability, Cardinality, Directives, Filter, ModelError,
    ModelResult, Namespace, Requirement, Resolution, RevisionId, UnitId, Version, VersionRange,
    Visibility, matches,
};
