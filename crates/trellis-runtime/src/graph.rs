//! The revision arena, unit registry and committed wirings.
//!
//! Revisions are immutable and addressed by [`RevisionId`]. A unit's current
//! revision is an id into the arena; every other revision of that unit is a
//! zombie that stays until a refresh retires it. Wirings reference
//! revisions by id only, so retiring a revision is a map removal plus
//! stripping the wires that pointed at it.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use trellis_core::{Namespace, RevisionId, UnitId, Visibility};

use crate::resolver::Candidate;
use crate::unit::{Revision, Translation, UnitInfo, UnitRecord, UnitState};
use crate::wiring::{HostedCapability, Wire, Wiring};

/// Units, revisions and wirings.
#[derive(Debug, Default)]
pub struct RevisionGraph {
    units: BTreeMap<UnitId, UnitRecord>,
    revisions: BTreeMap<RevisionId, Arc<Revision>>,
    wirings: BTreeMap<RevisionId, Wiring>,
    locations: HashMap<String, UnitId>,
    next_unit: u64,
}

impl RevisionGraph {
    /// An empty graph. The first allocated unit id is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_unit: 1,
            ..Self::default()
        }
    }

    /// Every revision still in the arena, current and zombie, in id order.
    pub fn all_revisions(&self) -> impl Iterator<Item = &Arc<Revision>> {
        self.revisions.values()
    }

    /// Look up a revision.
    #[must_use]
    pub fn revision(&self, id: RevisionId) -> Option<&Arc<Revision>> {
        self.revisions.get(&id)
    }

    /// The committed wiring of a revision.
    #[must_use]
    pub fn wiring(&self, id: RevisionId) -> Option<&Wiring> {
        self.wirings.get(&id)
    }

    /// Whether the revision has a committed wiring.
    #[must_use]
    pub fn is_wired(&self, id: RevisionId) -> bool {
        self.wirings.contains_key(&id)
    }

    /// Whether the revision has been superseded or its unit uninstalled.
    #[must_use]
    pub fn is_zombie(&self, id: RevisionId) -> bool {
        self.units
            .get(&id.unit)
            .is_none_or(|u| u.current != Some(id))
    }

    /// Whether the revision may take part in new wires: already wired and in
    /// use, or the current revision. Revisions of uninstalled units never
    /// are, even while their wiring is still in use.
    #[must_use]
    pub fn is_eligible(&self, id: RevisionId) -> bool {
        let installed = self
            .units
            .get(&id.unit)
            .is_some_and(|u| u.state != UnitState::Uninstalled);
        installed && (!self.is_zombie(id) || self.wirings.get(&id).is_some_and(Wiring::is_in_use))
    }

    /// Capabilities in `namespace` offered by eligible revisions.
    ///
    /// Fragments offer only their identity directly. Wired hosts also offer
    /// the capabilities of their attached fragments.
    #[must_use]
    pub fn capabilities_of(&self, namespace: &Namespace) -> Vec<Candidate> {
        let mut out = Vec::new();
        for (id, revision) in &self.revisions {
            if !self.is_eligible(*id) {
                continue;
            }
            if revision.is_fragment() && namespace != &Namespace::Identity {
                continue;
            }
            out.extend(revision.capabilities_in(namespace).map(|c| Candidate {
                provider: *id,
                declared_by: *id,
                capability: c.clone(),
            }));
            if let Some(wiring) = self.wirings.get(id) {
                out.extend(
                    wiring
                        .hosted
                        .iter()
                        .filter(|h| &h.capability.namespace == namespace)
                        .map(|h| Candidate {
                            provider: *id,
                            declared_by: h.declared_by,
                            capability: h.capability.clone(),
                        }),
                );
            }
        }
        out
    }

    /// Distinct revisions wired to capabilities of `id`, in id order.
    #[must_use]
    pub fn dependents(&self, id: RevisionId) -> Vec<RevisionId> {
        let Some(wiring) = self.wirings.get(&id) else {
            return Vec::new();
        };
        wiring
            .provided
            .iter()
            .map(|w| w.requirer)
            .filter(|r| *r != id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Revisions whose content `id` sees through `bundle` wires: the units
    /// it requires, then whatever those re-export, transitively. In the
    /// order they are reached.
    #[must_use]
    pub fn visible_bundles(&self, id: RevisionId) -> Vec<RevisionId> {
        let mut visible = Vec::new();
        let mut pending: VecDeque<RevisionId> = self.bundle_providers(id, false).into();
        while let Some(provider) = pending.pop_front() {
            if provider == id || visible.contains(&provider) {
                continue;
            }
            visible.push(provider);
            pending.extend(self.bundle_providers(provider, true));
        }
        visible
    }

    fn bundle_providers(&self, id: RevisionId, reexported_only: bool) -> Vec<RevisionId> {
        let Some(wiring) = self.wirings.get(&id) else {
            return Vec::new();
        };
        wiring
            .required_in(&Namespace::Bundle)
            .filter(|w| !reexported_only || w.requirement.visibility() == Visibility::Reexport)
            .map(|w| w.provider)
            .collect()
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<UnitInfo> {
        self.units.get(&id).map(UnitRecord::info)
    }

    /// Snapshot of every unit in the registry.
    #[must_use]
    pub fn units(&self) -> Vec<UnitInfo> {
        self.units.values().map(UnitRecord::info).collect()
    }

    /// The unit installed from `location`, if any.
    #[must_use]
    pub fn unit_at(&self, location: &str) -> Option<UnitId> {
        self.locations.get(location).copied()
    }

    /// The current revision of an installed unit.
    #[must_use]
    pub fn current_revision(&self, unit: UnitId) -> Option<&Arc<Revision>> {
        self.units
            .get(&unit)
            .and_then(|u| u.current)
            .and_then(|id| self.revisions.get(&id))
    }

    /// Units that still have zombie revisions or are uninstalled.
    #[must_use]
    pub fn removal_pending(&self) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| u.state == UnitState::Uninstalled || u.zombies().next().is_some())
            .map(|u| u.id)
            .collect()
    }

    pub(crate) fn record(&self, unit: UnitId) -> Option<&UnitRecord> {
        self.units.get(&unit)
    }

    pub(crate) fn record_mut(&mut self, unit: UnitId) -> Option<&mut UnitRecord> {
        self.units.get_mut(&unit)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.values()
    }

    /// The unit id the next install will receive.
    pub(crate) fn next_unit_id(&self) -> u64 {
        self.next_unit
    }

    /// Register a new unit with generation `0` built from `translation`.
    pub(crate) fn insert_unit(
        &mut self,
        location: &str,
        activator: Option<String>,
        translation: Translation,
        now: DateTime<Utc>,
    ) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit = self.next_unit.saturating_add(1);
        self.insert_unit_with_id(id, location, activator, translation, now, now);
        id
    }

    /// Register a unit under a known id. Used for the system unit and when
    /// restoring from the store.
    pub(crate) fn insert_unit_with_id(
        &mut self,
        id: UnitId,
        location: &str,
        activator: Option<String>,
        translation: Translation,
        installed_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) {
        let revision = RevisionId::new(id, 0);
        self.revisions
            .insert(revision, Revision::new(revision, translation));
        self.units.insert(id, UnitRecord {
            id,
            location: location.to_string(),
            activator,
            state: UnitState::Installed,
            current: Some(revision),
            revisions: vec![revision],
            next_generation: 1,
            installed_at,
            modified_at,
        });
        self.locations.insert(location.to_string(), id);
        if id.0 >= self.next_unit {
            self.next_unit = id.0.saturating_add(1);
        }
    }

    pub(crate) fn set_next_unit_id(&mut self, next: u64) {
        self.next_unit = self.next_unit.max(next);
    }

    /// Add a new generation and make it current. Returns `(new, previous)`.
    pub(crate) fn insert_revision(
        &mut self,
        unit: UnitId,
        translation: Translation,
        now: DateTime<Utc>,
    ) -> Option<(RevisionId, Option<RevisionId>)> {
        let record = self.units.get_mut(&unit)?;
        let id = RevisionId::new(unit, record.next_generation);
        record.next_generation = record.next_generation.saturating_add(1);
        let previous = record.current.replace(id);
        record.revisions.push(id);
        record.modified_at = now;
        self.revisions.insert(id, Revision::new(id, translation));
        Some((id, previous))
    }

    /// Mark a unit uninstalled; its current revision becomes a zombie.
    pub(crate) fn mark_zombie(&mut self, unit: UnitId, now: DateTime<Utc>) -> Option<RevisionId> {
        let record = self.units.get_mut(&unit)?;
        record.state = UnitState::Uninstalled;
        record.modified_at = now;
        let previous = record.current.take();
        self.locations.remove(&record.location);
        previous
    }

    pub(crate) fn set_state(&mut self, unit: UnitId, state: UnitState, now: DateTime<Utc>) {
        if let Some(record) = self.units.get_mut(&unit) {
            record.state = state;
            record.modified_at = now;
        }
    }

    /// Commit a batch of resolver wirings.
    ///
    /// All wirings are inserted before provided wires are attached, so
    /// providers wired in the same batch receive their provided wires.
    pub(crate) fn commit_wirings(&mut self, wirings: Vec<Wiring>) {
        let mut wires: Vec<Wire> = Vec::new();
        for mut wiring in wirings {
            wiring.in_use = true;
            wires.extend(
                wiring
                    .required
                    .iter()
                    .filter(|w| w.provider != wiring.revision)
                    .cloned(),
            );
            debug!(
                revision = %wiring.revision,
                required = wiring.required.len(),
                fragments = wiring.fragments.len(),
                "Committed wiring"
            );
            self.wirings.insert(wiring.revision, wiring);
        }
        for wire in wires {
            match self.wirings.get_mut(&wire.provider) {
                Some(provider) => provider.provided.push(wire),
                None => warn!(
                    provider = %wire.provider,
                    requirer = %wire.requirer,
                    "Wire provider has no wiring"
                ),
            }
        }
    }

    /// Add a fragment to a host wiring that is already committed.
    pub(crate) fn attach_fragment(&mut self, host: RevisionId, fragment: RevisionId) {
        let Some(revision) = self.revisions.get(&fragment) else {
            return;
        };
        let hosted: Vec<HostedCapability> = HostedCapability::of(revision).collect();
        match self.wirings.get_mut(&host) {
            Some(wiring) if !wiring.fragments.contains(&fragment) => {
                wiring.fragments.push(fragment);
                wiring.hosted.extend(hosted);
                debug!(host = %host, fragment = %fragment, "Fragment joined wired host");
            },
            Some(_) => {},
            None => warn!(host = %host, fragment = %fragment, "Fragment host has no wiring"),
        }
    }

    /// Remove a wiring and the provided wires it contributed to others.
    pub(crate) fn discard_wiring(&mut self, id: RevisionId) -> Option<Wiring> {
        let wiring = self.wirings.remove(&id)?;
        let providers: BTreeSet<RevisionId> = wiring.required.iter().map(|w| w.provider).collect();
        for provider in providers {
            if let Some(p) = self.wirings.get_mut(&provider) {
                p.provided.retain(|w| w.requirer != id);
            }
        }
        Some(wiring)
    }

    /// Keep a zombie wiring queryable but stop offering it to new requirers.
    pub(crate) fn retain_unused(&mut self, id: RevisionId) {
        if let Some(wiring) = self.wirings.get_mut(&id) {
            wiring.in_use = false;
        }
    }

    /// Remove a revision from the arena. Drops its unit from the registry
    /// when the unit is uninstalled and this was its last revision. Returns
    /// whether the revision existed.
    pub(crate) fn retire_revision(&mut self, id: RevisionId) -> bool {
        self.discard_wiring(id);
        if self.revisions.remove(&id).is_none() {
            return false;
        }
        let drop_unit = self.units.get_mut(&id.unit).is_some_and(|record| {
            record.revisions.retain(|r| *r != id);
            record.state == UnitState::Uninstalled && record.revisions.is_empty()
        });
        if drop_unit {
            self.units.remove(&id.unit);
            debug!(unit_id = %id.unit, "Unit removed from registry");
        }
        true
    }
}
