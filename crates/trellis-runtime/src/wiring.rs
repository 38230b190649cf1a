//! Wires and wirings: the resolver's output.

use trellis_core::{Capability, Namespace, Requirement, RevisionId};

use crate::unit::Revision;

/// A resolved connection from a requirement to the capability satisfying it.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    /// Revision whose wiring offers the capability.
    pub provider: RevisionId,
    /// Revision that declared (or inherited) the requirement.
    pub requirer: RevisionId,
    /// The capability.
    pub capability: Capability,
    /// The requirement.
    pub requirement: Requirement,
    /// Revision that declared the capability; a fragment when the capability
    /// is hosted.
    pub declared_by: RevisionId,
}

/// A fragment capability offered through its host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedCapability {
    /// The fragment revision that declared it.
    pub declared_by: RevisionId,
    /// The capability.
    pub capability: Capability,
}

impl HostedCapability {
    /// Everything `fragment` contributes to a host: its capabilities other
    /// than identity.
    pub(crate) fn of(fragment: &Revision) -> impl Iterator<Item = Self> + '_ {
        fragment
            .capabilities()
            .iter()
            .filter(|c| c.namespace != Namespace::Identity)
            .map(|c| Self {
                declared_by: fragment.id(),
                capability: c.clone(),
            })
    }
}

/// The wiring of one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Wiring {
    pub(crate) revision: RevisionId,
    pub(crate) provided: Vec<Wire>,
    pub(crate) required: Vec<Wire>,
    pub(crate) hosted: Vec<HostedCapability>,
    pub(crate) fragments: Vec<RevisionId>,
    pub(crate) dynamic: Vec<Requirement>,
    pub(crate) in_use: bool,
}

impl Wiring {
    pub(crate) fn new(revision: RevisionId) -> Self {
        Self {
            revision,
            provided: Vec::new(),
            required: Vec::new(),
            hosted: Vec::new(),
            fragments: Vec::new(),
            dynamic: Vec::new(),
            in_use: true,
        }
    }

    /// The revision this wiring belongs to.
    #[must_use]
    pub fn revision(&self) -> RevisionId {
        self.revision
    }

    /// Wires from other revisions' requirements to this revision.
    #[must_use]
    pub fn provided_wires(&self) -> &[Wire] {
        &self.provided
    }

    /// Wires from this revision's requirements, in requirement order.
    #[must_use]
    pub fn required_wires(&self) -> &[Wire] {
        &self.required
    }

    /// Required wires in one namespace.
    pub fn required_in<'a>(&'a self, namespace: &'a Namespace) -> impl Iterator<Item = &'a Wire> {
        self.required
            .iter()
            .filter(move |w| w.requirement.namespace() == namespace)
    }

    /// Capabilities contributed by attached fragments.
    #[must_use]
    pub fn hosted_capabilities(&self) -> &[HostedCapability] {
        &self.hosted
    }

    /// Attached fragment revisions.
    #[must_use]
    pub fn fragments(&self) -> &[RevisionId] {
        &self.fragments
    }

    /// Dynamic requirements, left unresolved.
    #[must_use]
    pub fn dynamic_requirements(&self) -> &[Requirement] {
        &self.dynamic
    }

    /// `false` marks a zombie wiring kept only because live wirings still
    /// reference it.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// Distinct provider revisions, in wire order.
    #[must_use]
    pub fn providers(&self) -> Vec<RevisionId> {
        let mut out: Vec<RevisionId> = Vec::new();
        for wire in &self.required {
            if !out.contains(&wire.provider) {
                out.push(wire.provider);
            }
        }
        out
    }
}
