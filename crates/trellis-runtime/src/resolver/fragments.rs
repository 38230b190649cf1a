//! Fragment to host attachment.

use std::collections::{BTreeMap, BTreeSet};

use trellis_core::{Namespace, RevisionId, matches};
use tracing::debug;

use super::candidates::{Candidate, rank};
use crate::graph::RevisionGraph;
use crate::unit::Revision;
use crate::wiring::Wiring;

/// Attachment plan for one resolve pass.
#[derive(Debug, Default)]
pub(crate) struct Attachments {
    by_host: BTreeMap<RevisionId, Vec<RevisionId>>,
    by_fragment: BTreeMap<RevisionId, RevisionId>,
    /// Hosts whose attachments have been decided.
    settled: BTreeSet<RevisionId>,
}

impl Attachments {
    pub(crate) fn host_of(&self, fragment: RevisionId) -> Option<RevisionId> {
        self.by_fragment.get(&fragment).copied()
    }

    pub(crate) fn fragments_of(&self, host: RevisionId) -> &[RevisionId] {
        self.by_host.get(&host).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn planned(&self) -> impl Iterator<Item = (RevisionId, &[RevisionId])> {
        self.by_host.iter().map(|(h, f)| (*h, f.as_slice()))
    }

    /// Unattached fragments paired with the unsettled host they would join
    /// if that host were pulled into the pass.
    pub(crate) fn prospective(
        &self,
        graph: &RevisionGraph,
        excluded: &BTreeSet<RevisionId>,
    ) -> Vec<(RevisionId, RevisionId)> {
        unattached_fragments(graph, self)
            .into_iter()
            .filter_map(|fragment| {
                let host = best_host(graph, fragment, None, excluded)?;
                (!self.settled.contains(&host)).then_some((host, fragment))
            })
            .collect()
    }

    fn attach(&mut self, fragment: RevisionId, host: RevisionId) {
        debug!(fragment = %fragment, host = %host, "Fragment attached");
        self.by_fragment.insert(fragment, host);
        self.by_host.entry(host).or_default().push(fragment);
    }

    /// Compute attachments for `targets` until nothing changes.
    ///
    /// Hosts in the pass are the non-fragment targets plus the best host of
    /// every fragment target. Every unwired eligible fragment then attaches
    /// to its best-ranked host among them.
    pub(crate) fn plan(
        &mut self,
        graph: &RevisionGraph,
        targets: &[RevisionId],
        excluded: &BTreeSet<RevisionId>,
    ) {
        let mut hosts: BTreeSet<RevisionId> = targets
            .iter()
            .copied()
            .filter(|t| {
                graph.revision(*t).is_some_and(|r| !r.is_fragment()) && !graph.is_wired(*t)
            })
            .collect();

        loop {
            let mut changed = false;
            for target in targets {
                if self.by_fragment.contains_key(target) {
                    continue;
                }
                if let Some(host) = best_host(graph, *target, None, excluded)
                    && hosts.insert(host)
                {
                    changed = true;
                }
            }
            for fragment in unattached_fragments(graph, self) {
                if let Some(host) = best_host(graph, fragment, Some(&hosts), excluded) {
                    self.attach(fragment, host);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        self.settled.extend(hosts);
    }

    /// Attach remaining fragments to a host pulled into the pass by
    /// recursion.
    pub(crate) fn settle(
        &mut self,
        graph: &RevisionGraph,
        host: RevisionId,
        excluded: &BTreeSet<RevisionId>,
    ) {
        if !self.settled.insert(host) {
            return;
        }
        let only = BTreeSet::from([host]);
        for fragment in unattached_fragments(graph, self) {
            if best_host(graph, fragment, Some(&only), excluded).is_some() {
                self.attach(fragment, host);
            }
        }
    }

    /// Pick a host for a fragment resolved on its own.
    pub(crate) fn attach_best(
        &mut self,
        graph: &RevisionGraph,
        fragment: RevisionId,
        excluded: &BTreeSet<RevisionId>,
    ) -> Option<RevisionId> {
        let host = best_host(graph, fragment, None, excluded)?;
        self.attach(fragment, host);
        Some(host)
    }
}

fn unattached_fragments(graph: &RevisionGraph, attachments: &Attachments) -> Vec<RevisionId> {
    graph
        .all_revisions()
        .filter(|r| r.is_fragment())
        .map(|r| r.id())
        .filter(|id| {
            !graph.is_wired(*id)
                && graph.is_eligible(*id)
                && !attachments.by_fragment.contains_key(id)
        })
        .collect()
}

/// Best unwired eligible host whose `host` capability satisfies the
/// fragment's host requirement, optionally limited to `within`.
fn best_host(
    graph: &RevisionGraph,
    fragment: RevisionId,
    within: Option<&BTreeSet<RevisionId>>,
    excluded: &BTreeSet<RevisionId>,
) -> Option<RevisionId> {
    let revision = graph.revision(fragment)?;
    if !revision.is_fragment() || graph.is_wired(fragment) {
        return None;
    }
    let requirement = revision
        .requirements()
        .iter()
        .find(|r| r.namespace() == &Namespace::Host)?;
    let mut candidates: Vec<Candidate> = graph
        .capabilities_of(&Namespace::Host)
        .into_iter()
        .filter(|c| {
            !graph.is_wired(c.provider)
                && !excluded.contains(&c.provider)
                && within.is_none_or(|set| set.contains(&c.provider))
                && matches(requirement, &c.capability)
        })
        .collect();
    rank(graph, &mut candidates);
    candidates.first().map(|c| c.provider)
}

/// Best wired, in-use host a fragment can join without re-resolving it.
///
/// `None` when the fragment declares anything beyond its host requirement,
/// since those requirements would have to be wired into the host.
pub(crate) fn best_wired_host(
    graph: &RevisionGraph,
    fragment: &Revision,
    excluded: &BTreeSet<RevisionId>,
) -> Option<RevisionId> {
    let requirement = fragment
        .requirements()
        .iter()
        .find(|r| r.namespace() == &Namespace::Host)?;
    let adds_requirements = fragment
        .requirements()
        .iter()
        .any(|r| r.is_effective() && r.namespace() != &Namespace::Host)
        || !fragment.required_ee().is_empty();
    if adds_requirements {
        return None;
    }
    let mut candidates: Vec<Candidate> = graph
        .capabilities_of(&Namespace::Host)
        .into_iter()
        .filter(|c| {
            graph.wiring(c.provider).is_some_and(Wiring::is_in_use)
                && graph.is_eligible(c.provider)
                && !excluded.contains(&c.provider)
                && matches(requirement, &c.capability)
        })
        .collect();
    rank(graph, &mut candidates);
    candidates.first().map(|c| c.provider)
}
