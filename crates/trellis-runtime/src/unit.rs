//! Units, revisions and lifecycle states.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core::{Capability, Namespace, Requirement, RevisionId, UnitId, Version};

use crate::resolver::ee::EeToken;

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitState {
    /// Installed; the current revision is not wired.
    Installed,
    /// The current revision is wired.
    Resolved,
    /// The start hook is running.
    Starting,
    /// Started.
    Active,
    /// The stop hook is running.
    Stopping,
    /// Uninstalled. Terminal.
    Uninstalled,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Installed => "INSTALLED",
            Self::Resolved => "RESOLVED",
            Self::Starting => "STARTING",
            Self::Active => "ACTIVE",
            Self::Stopping => "STOPPING",
            Self::Uninstalled => "UNINSTALLED",
        })
    }
}

/// Whether a revision is an ordinary unit or a fragment of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionKind {
    /// An ordinary revision.
    #[default]
    Normal,
    /// A fragment that attaches to a host.
    Fragment,
}

/// The translated content of one manifest.
///
/// Produced once per install or update by a
/// [`ManifestTranslator`](crate::ManifestTranslator) and never re-validated
/// by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    /// Symbolic name.
    pub symbolic_name: String,
    /// Unit version.
    pub version: Version,
    /// Normal or fragment.
    #[serde(default)]
    pub kind: RevisionKind,
    /// Activator declared by the manifest, if any.
    #[serde(default)]
    pub activator: Option<String>,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Declared requirements, in declaration order.
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Required execution environments, parsed.
    #[serde(default)]
    pub required_ee: Vec<EeToken>,
}

/// One immutable generation of a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    id: RevisionId,
    content: Translation,
}

impl Revision {
    pub(crate) fn new(id: RevisionId, content: Translation) -> Arc<Self> {
        Arc::new(Self { id, content })
    }

    /// Arena address of this revision.
    #[must_use]
    pub fn id(&self) -> RevisionId {
        self.id
    }

    /// Owning unit.
    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.id.unit
    }

    /// Symbolic name.
    #[must_use]
    pub fn symbolic_name(&self) -> &str {
        &self.content.symbolic_name
    }

    /// Version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.content.version
    }

    /// Normal or fragment.
    #[must_use]
    pub fn kind(&self) -> RevisionKind {
        self.content.kind
    }

    /// Whether this revision is a fragment.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.content.kind == RevisionKind::Fragment
    }

    /// Declared capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.content.capabilities
    }

    /// Declared requirements.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.content.requirements
    }

    /// Required execution environments.
    #[must_use]
    pub fn required_ee(&self) -> &[EeToken] {
        &self.content.required_ee
    }

    /// The translated manifest this revision was built from.
    #[must_use]
    pub fn translation(&self) -> &Translation {
        &self.content
    }

    /// Capabilities in one namespace.
    pub fn capabilities_in<'a>(
        &'a self,
        namespace: &'a Namespace,
    ) -> impl Iterator<Item = &'a Capability> + 'a {
        self.content
            .capabilities
            .iter()
            .filter(move |c| &c.namespace == namespace)
    }

    /// The identity capability, if declared.
    #[must_use]
    pub fn identity(&self) -> Option<&Capability> {
        self.capabilities_in(&Namespace::Identity).next()
    }

    /// Whether the identity capability is marked singleton.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.identity().is_some_and(Capability::is_singleton)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{} [{}]", self.symbolic_name(), self.version(), self.id)
    }
}

/// Registry entry for an installed unit.
#[derive(Debug, Clone)]
pub(crate) struct UnitRecord {
    pub(crate) id: UnitId,
    pub(crate) location: String,
    pub(crate) activator: Option<String>,
    pub(crate) state: UnitState,
    /// `None` once uninstalled.
    pub(crate) current: Option<RevisionId>,
    /// Every revision still in the arena, oldest first.
    pub(crate) revisions: Vec<RevisionId>,
    pub(crate) next_generation: u32,
    pub(crate) installed_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
}

impl UnitRecord {
    pub(crate) fn zombies(&self) -> impl Iterator<Item = RevisionId> + '_ {
        self.revisions
            .iter()
            .copied()
            .filter(move |r| Some(*r) != self.current)
    }

    pub(crate) fn info(&self) -> UnitInfo {
        UnitInfo {
            id: self.id,
            location: self.location.clone(),
            activator: self.activator.clone(),
            state: self.state,
            current_revision: self.current,
            revisions: self.revisions.clone(),
            installed_at: self.installed_at,
            modified_at: self.modified_at,
        }
    }
}

/// Read-only snapshot of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInfo {
    /// Unit id.
    pub id: UnitId,
    /// Install location.
    pub location: String,
    /// Activator name.
    pub activator: Option<String>,
    /// Lifecycle state.
    pub state: UnitState,
    /// Current revision; `None` once uninstalled.
    pub current_revision: Option<RevisionId>,
    /// Every revision still present, including zombies.
    pub revisions: Vec<RevisionId>,
    /// Install time.
    pub installed_at: DateTime<Utc>,
    /// Time of the last install, update or state change.
    pub modified_at: DateTime<Utc>,
}

impl UnitInfo {
    /// Whether the unit still has revisions awaiting removal by a refresh.
    #[must_use]
    pub fn removal_pending(&self) -> bool {
        self.state == UnitState::Uninstalled
            || self.revisions.iter().any(|r| Some(*r) != self.current_revision)
    }
}
