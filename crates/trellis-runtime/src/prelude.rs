//! Prelude module - commonly used types for convenient import.
//!
//! Use `use trellis_runtime::prelude::*;` to import all essential types.

pub use crate::{
    Activator, Framework, FrameworkBuilder, RefreshReport, ResolveError, Revision, RuntimeError,
    RuntimeResult, UnitContext, UnitInfo, UnitState, Wire, Wiring,
};
pub use trellis_core::{RevisionId, UnitId};
