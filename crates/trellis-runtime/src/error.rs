//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;
use trellis_core::{RevisionId, UnitId};

use crate::unit::UnitState;

/// Why a revision could not be wired.
///
/// Resolve errors never modify the graph: a failed revision keeps no
/// wiring and every other revision's wiring is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A mandatory requirement had no acceptable provider.
    #[error("{revision}: unsatisfied requirement {requirement} (candidates: [{}])", candidates.join(", "))]
    UnsatisfiedRequirement {
        /// The revision that failed.
        revision: RevisionId,
        /// Description of the requirement.
        requirement: String,
        /// Candidates that matched but could not be wired.
        candidates: Vec<String>,
    },

    /// Another singleton revision with the same symbolic name is already
    /// wired or was resolved earlier in the same batch.
    #[error("{revision} collides with singleton {existing} ({symbolic_name})")]
    SingletonCollision {
        /// The revision that failed.
        revision: RevisionId,
        /// Shared symbolic name.
        symbolic_name: String,
        /// The revision that won.
        existing: RevisionId,
    },

    /// A fragment found no host that could accept it.
    #[error("fragment {revision} has no resolvable host")]
    NoHost {
        /// The fragment revision.
        revision: RevisionId,
    },

    /// A resolver hook refused to let the revision resolve.
    #[error("resolution of {revision} vetoed by resolver hook")]
    Vetoed {
        /// The vetoed revision.
        revision: RevisionId,
    },
}

impl ResolveError {
    /// The revision the error is about.
    #[must_use]
    pub fn revision(&self) -> RevisionId {
        match self {
            Self::UnsatisfiedRequirement { revision, .. }
            | Self::SingletonCollision { revision, .. }
            | Self::NoHost { revision }
            | Self::Vetoed { revision } => *revision,
        }
    }
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The raw manifest could not be translated.
    #[error("manifest translation failed: {reason}")]
    ManifestTranslation {
        /// What was wrong with the manifest.
        reason: String,
    },

    /// The unit's current revision could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// An activator hook failed.
    #[error("activator of {unit} failed: {message}")]
    Activation {
        /// The unit whose hook failed.
        unit: UnitId,
        /// Rendered hook error.
        message: String,
    },

    /// A unit could not be re-resolved or restarted during a refresh.
    #[error("refresh of {unit} failed: {source}")]
    RefreshCascade {
        /// The affected unit.
        unit: UnitId,
        /// The underlying failure.
        #[source]
        source: Box<RuntimeError>,
    },

    /// Fragments cannot be started.
    #[error("{unit} is a fragment and cannot be started")]
    FragmentNotStartable {
        /// The fragment unit.
        unit: UnitId,
    },

    /// The operation is not allowed in the unit's current state.
    #[error("{operation} not allowed for {unit} in state {state}")]
    InvalidState {
        /// The unit.
        unit: UnitId,
        /// Its state.
        state: UnitState,
        /// The attempted operation.
        operation: &'static str,
    },

    /// No unit with this id is installed.
    #[error("{0} not found")]
    UnitNotFound(UnitId),

    /// No revision with this id exists.
    #[error("revision {0} not found")]
    RevisionNotFound(RevisionId),

    /// The system unit cannot be stopped, updated or uninstalled.
    #[error("{operation} not allowed on the system unit")]
    SystemUnit {
        /// The attempted operation.
        operation: &'static str,
    },

    /// The persistent unit store could not be read or written.
    #[error("unit store error at {}: {message}", path.display())]
    Store {
        /// Store file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Invalid framework configuration.
    #[error("invalid framework configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub(crate) fn translation(reason: impl std::fmt::Display) -> Self {
        Self::ManifestTranslation {
            reason: reason.to_string(),
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
