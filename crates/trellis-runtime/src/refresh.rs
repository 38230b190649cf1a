//! Refresh: tear down and rebuild the wiring of a dependency closure.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tracing::{debug, info, warn};
use trellis_core::{Namespace, RevisionId, UnitId};
use trellis_events::{FrameworkEvent, UnitEventKind};

use crate::error::RuntimeError;
use crate::framework::Framework;
use crate::graph::RevisionGraph;
use crate::unit::UnitState;
use crate::wiring::Wiring;

tokio::task_local! {
    /// Set on the task running a refresh.
    static REFRESHING: ();
}

/// Outcome of [`Framework::refresh_packages`].
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Every unit in the refresh closure, providers first.
    pub closure: Vec<UnitId>,
    /// Units stopped by the refresh, in stop order.
    pub stopped: Vec<UnitId>,
    /// Units started again after re-resolution.
    pub restarted: Vec<UnitId>,
    /// Revisions removed from the framework.
    pub removed_revisions: Vec<RevisionId>,
    /// Per-unit failures, each a [`RuntimeError::RefreshCascade`].
    pub errors: Vec<RuntimeError>,
    /// The refresh was requested from a hook of a running refresh and has
    /// been queued behind it; the other fields are empty.
    pub deferred: bool,
}

impl RefreshReport {
    /// Whether every unit came back.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn absorb(&mut self, other: RefreshReport) {
        for unit in other.closure {
            if !self.closure.contains(&unit) {
                self.closure.push(unit);
            }
        }
        self.stopped.extend(other.stopped);
        self.restarted.extend(other.restarted);
        self.removed_revisions.extend(other.removed_revisions);
        self.errors.extend(other.errors);
    }
}

fn cascade(unit: UnitId, source: RuntimeError) -> RuntimeError {
    RuntimeError::RefreshCascade {
        unit,
        source: Box::new(source),
    }
}

/// Units directly linked to `unit` by wires: dependents of any of its
/// revisions, attached fragments, and the host of a fragment.
fn linked_units(graph: &RevisionGraph, unit: UnitId) -> BTreeSet<UnitId> {
    let mut linked = BTreeSet::new();
    let Some(record) = graph.record(unit) else {
        return linked;
    };
    for revision in &record.revisions {
        linked.extend(graph.dependents(*revision).into_iter().map(|r| r.unit));
        if let Some(wiring) = graph.wiring(*revision) {
            linked.extend(wiring.fragments().iter().map(|f| f.unit));
            linked.extend(
                wiring
                    .required_in(&Namespace::Host)
                    .map(|w| w.provider.unit),
            );
        }
    }
    linked.remove(&unit);
    linked.remove(&UnitId::SYSTEM);
    linked
}

fn closure(graph: &RevisionGraph, initial: &[UnitId]) -> BTreeSet<UnitId> {
    let mut members = BTreeSet::new();
    let mut pending: Vec<UnitId> = initial
        .iter()
        .copied()
        .filter(|u| !u.is_system() && graph.record(*u).is_some())
        .collect();
    while let Some(unit) = pending.pop() {
        if members.insert(unit) {
            pending.extend(linked_units(graph, unit));
        }
    }
    members
}

/// Provider edges between members: `edges[p]` holds the members wired to `p`.
fn provider_edges(
    graph: &RevisionGraph,
    members: &BTreeSet<UnitId>,
) -> BTreeMap<UnitId, BTreeSet<UnitId>> {
    let mut edges: BTreeMap<UnitId, BTreeSet<UnitId>> = BTreeMap::new();
    for unit in members {
        let Some(record) = graph.record(*unit) else {
            continue;
        };
        for revision in &record.revisions {
            for dependent in graph.dependents(*revision) {
                if dependent.unit != *unit && members.contains(&dependent.unit) {
                    edges.entry(*unit).or_default().insert(dependent.unit);
                }
            }
        }
    }
    edges
}

/// Topological order, providers first. Ties and cycles are broken by the
/// lowest unit id.
fn order_units(
    members: &BTreeSet<UnitId>,
    edges: &BTreeMap<UnitId, BTreeSet<UnitId>>,
) -> Vec<UnitId> {
    let mut indegree: BTreeMap<UnitId, usize> = members.iter().map(|u| (*u, 0)).collect();
    for requirers in edges.values() {
        for requirer in requirers {
            if let Some(n) = indegree.get_mut(requirer) {
                *n = n.saturating_add(1);
            }
        }
    }

    let mut order = Vec::with_capacity(members.len());
    while !indegree.is_empty() {
        let next = indegree
            .iter()
            .find(|(_, n)| **n == 0)
            .or_else(|| indegree.iter().next())
            .map(|(u, _)| *u);
        let Some(next) = next else {
            break;
        };
        indegree.remove(&next);
        if let Some(requirers) = edges.get(&next) {
            for requirer in requirers {
                if let Some(n) = indegree.get_mut(requirer) {
                    *n = n.saturating_sub(1);
                }
            }
        }
        order.push(next);
    }
    order
}

impl Framework {
    /// Rebuild the wiring of `units` and everything wired to them.
    ///
    /// With `None` the initial set is [`Framework::removal_pending`]. Active
    /// members are stopped, zombie revisions are removed, and the stopped
    /// units are resolved and started again. A stopped unit that no longer
    /// resolves keeps its previous wiring and stays RESOLVED. Failures are
    /// collected per unit in the report; other units continue.
    ///
    /// Refreshes are serialised. A refresh requested by an activator hook
    /// while a refresh runs on the same task is queued, returns a
    /// [`RefreshReport::deferred`] report, and runs once the current refresh
    /// is done; its results are merged into the outer report.
    pub async fn refresh_packages(&self, units: Option<&[UnitId]>) -> RefreshReport {
        let request = units.map(<[UnitId]>::to_vec);
        if REFRESHING.try_with(|_| ()).is_ok() {
            debug!("Refresh requested from a hook, queued behind the running refresh");
            self.inner.queued_refreshes.lock().await.push(request);
            return RefreshReport {
                deferred: true,
                ..RefreshReport::default()
            };
        }

        let _refresh = self.inner.refresh_lock.lock().await;
        REFRESHING
            .scope((), async move {
                let mut report = self.refresh_once(request).await;
                loop {
                    let queued = std::mem::take(&mut *self.inner.queued_refreshes.lock().await);
                    if queued.is_empty() {
                        break;
                    }
                    for request in queued {
                        report.absorb(self.refresh_once(request).await);
                    }
                }
                report
            })
            .await
    }

    async fn refresh_once(&self, units: Option<Vec<UnitId>>) -> RefreshReport {
        let mut report = RefreshReport::default();

        let active = {
            let graph = self.inner.graph.read().await;
            let initial = units.unwrap_or_else(|| graph.removal_pending());
            let members = closure(&graph, &initial);
            report.closure = order_units(&members, &provider_edges(&graph, &members));
            report
                .closure
                .iter()
                .copied()
                .filter(|u| graph.record(*u).is_some_and(|r| r.state == UnitState::Active))
                .collect::<Vec<_>>()
        };
        if report.closure.is_empty() {
            debug!("Nothing to refresh");
            self.publish(vec![FrameworkEvent::PackagesRefreshed { units: Vec::new() }]);
            return report;
        }
        info!(units = report.closure.len(), "Refreshing units");

        for unit in active.iter().rev() {
            match self.stop(*unit).await {
                Ok(()) => report.stopped.push(*unit),
                Err(e) => {
                    warn!(unit_id = %unit, error = %e, "Failed to stop unit for refresh");
                    report.errors.push(cascade(*unit, e));
                },
            }
        }

        // Zombies are set aside, not retired, until the restart list has
        // been re-resolved: a unit that fails keeps wires to them.
        let mut events = Vec::new();
        let mut previous: BTreeMap<UnitId, Wiring> = BTreeMap::new();
        let mut zombies: BTreeSet<RevisionId> = BTreeSet::new();
        {
            let mut graph = self.inner.graph.write().await;
            let now = Utc::now();
            for unit in &report.closure {
                let Some(record) = graph.record(*unit) else {
                    continue;
                };
                let revisions = record.revisions.clone();
                let current = record.current;
                let state = record.state;

                for revision in revisions {
                    if Some(revision) != current {
                        graph.retain_unused(revision);
                        zombies.insert(revision);
                    } else if let Some(wiring) = graph.discard_wiring(revision)
                        && report.stopped.contains(unit)
                    {
                        previous.insert(*unit, wiring);
                    }
                }

                if state == UnitState::Resolved {
                    graph.set_state(*unit, UnitState::Installed, now);
                    events.push(FrameworkEvent::unit(UnitEventKind::Unresolved, *unit));
                }
            }
            self.persist(&graph);
        }
        self.publish(events);

        let restart: Vec<UnitId> = report
            .stopped
            .iter()
            .rev()
            .copied()
            .collect();
        let mut resolved = self.resolve_units(&restart).await;
        let mut failed = Vec::new();
        for unit in &restart {
            if let Some(Err(e)) = resolved.remove(unit) {
                warn!(unit_id = %unit, error = %e, "Unit no longer resolves after refresh");
                report.errors.push(cascade(*unit, e));
                failed.push(*unit);
            }
        }
        previous.retain(|unit, _| failed.contains(unit));

        let mut events = Vec::new();
        {
            let mut graph = self.inner.graph.write().await;
            let now = Utc::now();
            for unit in restore_previous(&mut graph, previous) {
                graph.set_state(unit, UnitState::Resolved, now);
                info!(unit_id = %unit, "Unit kept its previous wiring");
                events.push(FrameworkEvent::unit(UnitEventKind::Resolved, unit));
            }
            for revision in collectable(&graph, zombies) {
                if graph.retire_revision(revision) {
                    debug!(revision = %revision, "Revision removed");
                    report.removed_revisions.push(revision);
                    events.push(FrameworkEvent::RevisionRemoved { revision });
                }
            }
            self.persist(&graph);
        }
        self.publish(events);

        for unit in restart {
            if failed.contains(&unit) {
                continue;
            }
            match self.start(unit).await {
                Ok(()) => report.restarted.push(unit),
                Err(e) => {
                    warn!(unit_id = %unit, error = %e, "Unit failed to restart after refresh");
                    report.errors.push(cascade(unit, e));
                },
            }
        }

        info!(
            units = report.closure.len(),
            removed = report.removed_revisions.len(),
            errors = report.errors.len(),
            "Refresh complete"
        );
        self.publish(vec![FrameworkEvent::PackagesRefreshed {
            units: report.closure.clone(),
        }]);
        report
    }
}

/// Commit again the wirings of units that failed to re-resolve. A wiring
/// whose providers have no wiring left (and are not restored with it) is
/// dropped and its unit stays INSTALLED. Returns the restored units.
fn restore_previous(
    graph: &mut RevisionGraph,
    mut previous: BTreeMap<UnitId, Wiring>,
) -> Vec<UnitId> {
    loop {
        let restorable: BTreeSet<RevisionId> = previous.values().map(Wiring::revision).collect();
        let broken: Vec<UnitId> = previous
            .iter()
            .filter(|(_, wiring)| {
                wiring.required.iter().any(|w| {
                    !graph.is_wired(w.provider) && !restorable.contains(&w.provider)
                })
            })
            .map(|(unit, _)| *unit)
            .collect();
        if broken.is_empty() {
            break;
        }
        for unit in broken {
            warn!(unit_id = %unit, "Previous wiring lost a provider, unit left unresolved");
            previous.remove(&unit);
        }
    }

    let units: Vec<UnitId> = previous.keys().copied().collect();
    graph.commit_wirings(
        previous
            .into_values()
            .map(|mut wiring| {
                // Requirers re-add their wires when they are committed.
                wiring.provided.clear();
                wiring
            })
            .collect(),
    );
    units
}

/// Zombies that nothing outside the set is wired to any more. Zombies kept
/// alive only by other collectable zombies are collectable too.
fn collectable(graph: &RevisionGraph, mut zombies: BTreeSet<RevisionId>) -> BTreeSet<RevisionId> {
    loop {
        let referenced: Vec<RevisionId> = zombies
            .iter()
            .copied()
            .filter(|z| graph.dependents(*z).iter().any(|d| !zombies.contains(d)))
            .collect();
        if referenced.is_empty() {
            return zombies;
        }
        for revision in referenced {
            debug!(revision = %revision, "Zombie still wired, kept until a later refresh");
            zombies.remove(&revision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u64]) -> BTreeSet<UnitId> {
        ids.iter().map(|i| UnitId(*i)).collect()
    }

    #[test]
    fn test_order_puts_providers_first() {
        let members = set(&[1, 2, 3]);
        let mut edges = BTreeMap::new();
        edges.insert(UnitId(3), set(&[2]));
        edges.insert(UnitId(2), set(&[1]));
        assert_eq!(order_units(&members, &edges), vec![UnitId(3), UnitId(2), UnitId(1)]);
    }

    #[test]
    fn test_order_breaks_cycles_by_unit_id() {
        let members = set(&[4, 5, 6]);
        let mut edges = BTreeMap::new();
        edges.insert(UnitId(5), set(&[6]));
        edges.insert(UnitId(6), set(&[5]));
        edges.insert(UnitId(4), set(&[5]));
        assert_eq!(order_units(&members, &edges), vec![UnitId(4), UnitId(5), UnitId(6)]);
    }

    #[test]
    fn test_order_independent_units_by_id() {
        let members = set(&[9, 2, 7]);
        assert_eq!(
            order_units(&members, &BTreeMap::new()),
            vec![UnitId(2), UnitId(7), UnitId(9)]
        );
    }
}
