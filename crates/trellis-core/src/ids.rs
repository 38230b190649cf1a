//! Unit and revision identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable numeric identity of an installed unit.
///
/// Ids are assigned at install time, never reused, and survive updates and
/// restarts. Unit `0` is the system unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

impl UnitId {
    /// The system unit.
    pub const SYSTEM: Self = Self(0);

    /// Whether this is the system unit.
    #[must_use]
    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Address of one revision in the revision arena: `(unit, generation)`.
///
/// Generation `0` is created by install; every update adds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionId {
    /// Owning unit.
    pub unit: UnitId,
    /// Generation within the unit.
    pub generation: u32,
}

impl RevisionId {
    /// Create a revision id.
    #[must_use]
    pub fn new(unit: UnitId, generation: u32) -> Self {
        Self { unit, generation }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unit.0, self.generation)
    }
}
