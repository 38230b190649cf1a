//! Framework notification types.

use serde::{Deserialize, Serialize};
use trellis_core::{RevisionId, UnitId};

/// Which lifecycle transition a unit event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitEventKind {
    /// The unit was installed.
    Installed,
    /// The unit's current revision was wired.
    Resolved,
    /// The start hook is about to run.
    Starting,
    /// The start hook returned successfully.
    Started,
    /// The stop hook is about to run.
    Stopping,
    /// The unit is back in RESOLVED after stopping.
    Stopped,
    /// A new revision became current.
    Updated,
    /// The unit's wiring was discarded by a refresh.
    Unresolved,
    /// The unit was uninstalled.
    Uninstalled,
}

impl UnitEventKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Resolved => "resolved",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Updated => "updated",
            Self::Unresolved => "unresolved",
            Self::Uninstalled => "uninstalled",
        }
    }
}

/// A notification published by the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameworkEvent {
    /// A unit changed lifecycle state.
    Unit {
        /// What happened.
        kind: UnitEventKind,
        /// The unit it happened to.
        unit: UnitId,
    },
    /// A revision became garbage and was dropped from the graph.
    ///
    /// Published exactly once per revision.
    RevisionRemoved {
        /// The dropped revision.
        revision: RevisionId,
    },
    /// A refresh finished.
    PackagesRefreshed {
        /// Every unit in the refresh closure.
        units: Vec<UnitId>,
    },
    /// A failure that could not be returned to a caller, such as a stop hook
    /// error during uninstall.
    Error {
        /// The unit involved.
        unit: UnitId,
        /// Rendered error.
        message: String,
    },
}

impl FrameworkEvent {
    /// Shorthand for [`FrameworkEvent::Unit`].
    #[must_use]
    pub fn unit(kind: UnitEventKind, unit: UnitId) -> Self {
        Self::Unit { kind, unit }
    }

    /// Stable name of the event, used in logs.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Unit { kind, .. } => kind.as_str(),
            Self::RevisionRemoved { .. } => "revision_removed",
            Self::PackagesRefreshed { .. } => "packages_refreshed",
            Self::Error { .. } => "error",
        }
    }

    /// The unit this event concerns, if exactly one.
    #[must_use]
    pub fn unit_id(&self) -> Option<UnitId> {
        match self {
            Self::Unit { unit, .. } | Self::Error { unit, .. } => Some(*unit),
            Self::RevisionRemoved { revision } => Some(revision.unit),
            Self::PackagesRefreshed { .. } => None,
        }
    }
}
