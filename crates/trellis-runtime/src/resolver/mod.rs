//! The module resolution engine.
//!
//! Resolution is a greedy, deterministically ordered search. For every
//! requirement the best-ranked candidate whose provider is (or can be made)
//! wired is taken; there is no backtracking across sibling requirements.
//! Providers that are not yet wired are resolved recursively inside the same
//! pass, and cycles are accepted.
//!
//! The resolver never mutates the graph. It returns the wirings to commit,
//! so a failed target leaves no trace.

pub(crate) mod candidates;
pub mod ee;
mod fragments;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;
use trellis_core::{
    Capability, Cardinality, Namespace, Requirement, Resolution, RevisionId, Version,
    escape_value, matches,
};

pub use self::candidates::{Candidate, ResolverHook, rank};
use self::fragments::Attachments;
use crate::error::ResolveError;
use crate::graph::RevisionGraph;
use crate::unit::Revision;
use crate::wiring::{HostedCapability, Wire, Wiring};

/// The implicit import every ordinary revision receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapImport {
    /// Package name.
    pub package: String,
    /// Version exported by the system unit.
    pub version: Version,
}

/// Framework-wide settings the resolver consults.
#[derive(Clone, Default)]
pub struct ResolverPolicy {
    /// Implicit bootstrap import, `None` to disable it.
    pub bootstrap: Option<BootstrapImport>,
    /// Legacy execution environment names and their replacements.
    pub ee_aliases: BTreeMap<String, String>,
    /// Optional candidate filter and veto hook.
    pub hook: Option<Arc<dyn ResolverHook>>,
}

impl std::fmt::Debug for ResolverPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverPolicy")
            .field("bootstrap", &self.bootstrap)
            .field("ee_aliases", &self.ee_aliases)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Everything one resolve call sees: a graph snapshot and the policy.
#[derive(Debug, Clone, Copy)]
pub struct ResolverContext<'a> {
    /// The graph to resolve against.
    pub graph: &'a RevisionGraph,
    /// Framework policy.
    pub policy: &'a ResolverPolicy,
}

impl<'a> ResolverContext<'a> {
    /// Create a context.
    #[must_use]
    pub fn new(graph: &'a RevisionGraph, policy: &'a ResolverPolicy) -> Self {
        Self { graph, policy }
    }
}

/// Result for one target.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The target is wired (already, or by this pass).
    Wired,
    /// The target could not be wired.
    Failed(ResolveError),
}

/// A fragment attached to a host whose wiring already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateAttachment {
    /// The wired host.
    pub host: RevisionId,
    /// The fragment joining it.
    pub fragment: RevisionId,
}

/// Output of [`Resolver::resolve`].
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Per-target outcome.
    pub outcomes: BTreeMap<RevisionId, ResolveOutcome>,
    /// New wirings, including side-effect resolutions, in id order.
    pub wirings: Vec<Wiring>,
    /// Fragments to add to existing host wirings once `wirings` are
    /// committed.
    pub late_attachments: Vec<LateAttachment>,
}

impl ResolveReport {
    /// Revisions that gained a wiring in this pass.
    pub fn newly_wired(&self) -> impl Iterator<Item = RevisionId> + '_ {
        self.wirings.iter().map(Wiring::revision)
    }
}

/// Stateless entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    /// Resolve `targets` against `ctx`.
    ///
    /// Targets are processed independently in ascending id order. Unknown
    /// ids are ignored.
    #[must_use]
    pub fn resolve(ctx: &ResolverContext<'_>, targets: &[RevisionId]) -> ResolveReport {
        let targets: Vec<RevisionId> = targets
            .iter()
            .copied()
            .filter(|t| ctx.graph.revision(*t).is_some())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut session = Session::new(ctx);
        session
            .attachments
            .plan(ctx.graph, &targets, &BTreeSet::new());

        let mut outcomes = BTreeMap::new();
        for target in targets {
            let outcome = match session.resolve_revision(target) {
                Ok(()) => ResolveOutcome::Wired,
                Err(e) => {
                    debug!(revision = %target, error = %e, "Resolve failed");
                    ResolveOutcome::Failed(e)
                },
            };
            outcomes.insert(target, outcome);
        }

        ResolveReport {
            outcomes,
            wirings: session.solution.into_values().collect(),
            late_attachments: session.late,
        }
    }
}

enum Found {
    /// Only the requirer itself provides the capability.
    SelfSatisfied,
    Candidates(Vec<Candidate>),
}

struct Session<'c, 'g> {
    ctx: &'c ResolverContext<'g>,
    solution: BTreeMap<RevisionId, Wiring>,
    /// Insertion order of `solution`, for rollback.
    order: Vec<RevisionId>,
    in_progress: BTreeSet<RevisionId>,
    failed: BTreeMap<RevisionId, ResolveError>,
    attachments: Attachments,
    late: Vec<LateAttachment>,
}

impl<'c, 'g> Session<'c, 'g> {
    fn new(ctx: &'c ResolverContext<'g>) -> Self {
        Self {
            ctx,
            solution: BTreeMap::new(),
            order: Vec::new(),
            in_progress: BTreeSet::new(),
            failed: BTreeMap::new(),
            attachments: Attachments::default(),
            late: Vec::new(),
        }
    }

    fn graph(&self) -> &'g RevisionGraph {
        self.ctx.graph
    }

    fn is_done(&self, id: RevisionId) -> bool {
        self.graph().is_wired(id)
            || self.solution.contains_key(&id)
            || self.in_progress.contains(&id)
    }

    fn fail(&mut self, error: ResolveError) -> Result<(), ResolveError> {
        self.failed.insert(error.revision(), error.clone());
        Err(error)
    }

    fn excluded(&self) -> BTreeSet<RevisionId> {
        self.failed.keys().copied().collect()
    }

    fn resolve_revision(&mut self, id: RevisionId) -> Result<(), ResolveError> {
        if self.is_done(id) {
            return Ok(());
        }
        if let Some(error) = self.failed.get(&id) {
            return Err(error.clone());
        }
        // `resolve` filters unknown targets and candidates come from the graph.
        let Some(revision) = self.graph().revision(id).cloned() else {
            return Ok(());
        };

        if revision.is_fragment() {
            return self.resolve_fragment(&revision);
        }

        if let Some(hook) = &self.ctx.policy.hook
            && !hook.allow_resolve(&revision)
        {
            return self.fail(ResolveError::Vetoed { revision: id });
        }
        if let Some(existing) = self.singleton_conflict(&revision) {
            return self.fail(ResolveError::SingletonCollision {
                revision: id,
                symbolic_name: revision.symbolic_name().to_string(),
                existing,
            });
        }

        let excluded = self.excluded();
        let graph = self.graph();
        self.attachments.settle(graph, id, &excluded);

        self.in_progress.insert(id);
        let snapshot = self.order.len();
        let late_snapshot = self.late.len();
        let outcome = self.wire(&revision);
        self.in_progress.remove(&id);

        match outcome {
            Ok(wiring) => {
                let fragments = wiring.fragments.clone();
                self.add(wiring);
                for fragment in fragments {
                    let host_wire = self.fragment_wiring(id, fragment);
                    self.add(host_wire);
                }
                Ok(())
            },
            Err(error) => {
                for rolled_back in self.order.drain(snapshot..) {
                    self.solution.remove(&rolled_back);
                }
                self.late.truncate(late_snapshot);
                self.fail(error)
            },
        }
    }

    fn resolve_fragment(&mut self, fragment: &Revision) -> Result<(), ResolveError> {
        let id = fragment.id();
        let excluded = self.excluded();
        let graph = self.graph();
        let host = match self.attachments.host_of(id) {
            Some(host) => Some(host),
            None => self.attachments.attach_best(graph, id, &excluded),
        };
        let no_host = ResolveError::NoHost { revision: id };
        let Some(host) = host else {
            // Only a fragment that adds no requirements may join a host
            // that is already wired.
            if let Some(host) = fragments::best_wired_host(graph, fragment, &excluded) {
                debug!(fragment = %id, host = %host, "Fragment attached to wired host");
                self.late.push(LateAttachment { host, fragment: id });
                let wiring = self.fragment_wiring(host, id);
                self.add(wiring);
                return Ok(());
            }
            return self.fail(no_host);
        };
        if self.resolve_revision(host).is_err() || !self.is_done(id) {
            return self.fail(no_host);
        }
        Ok(())
    }

    fn add(&mut self, wiring: Wiring) {
        self.order.push(wiring.revision);
        self.solution.insert(wiring.revision, wiring);
    }

    fn fragment_wiring(&self, host: RevisionId, fragment: RevisionId) -> Wiring {
        let mut wiring = Wiring::new(fragment);
        let graph = self.graph();
        let host_cap = graph
            .revision(host)
            .and_then(|h| h.capabilities_in(&Namespace::Host).next().cloned());
        let host_req = graph.revision(fragment).and_then(|f| {
            f.requirements()
                .iter()
                .find(|r| r.namespace() == &Namespace::Host)
                .cloned()
        });
        if let (Some(capability), Some(requirement)) = (host_cap, host_req) {
            wiring.required.push(Wire {
                provider: host,
                requirer: fragment,
                capability,
                requirement,
                declared_by: host,
            });
        }
        wiring
    }

    /// A singleton of another unit with the same name that is wired or
    /// planned. The unit's own older revisions never collide with it.
    fn singleton_conflict(&self, revision: &Revision) -> Option<RevisionId> {
        if !revision.is_singleton() {
            return None;
        }
        let graph = self.graph();
        graph
            .all_revisions()
            .filter(|r| r.unit() != revision.unit())
            .filter(|r| r.is_singleton() && r.symbolic_name() == revision.symbolic_name())
            .map(|r| r.id())
            .find(|other| {
                let wired = graph.wiring(*other).is_some_and(Wiring::is_in_use)
                    && graph.is_eligible(*other);
                wired || self.solution.contains_key(other)
            })
    }

    /// Build the wiring of a host revision and its attached fragments.
    fn wire(&mut self, revision: &Revision) -> Result<Wiring, ResolveError> {
        let id = revision.id();
        let graph = self.graph();
        let fragments: Vec<Arc<Revision>> = self
            .attachments
            .fragments_of(id)
            .iter()
            .filter_map(|f| graph.revision(*f).cloned())
            .collect();

        let mut wiring = Wiring::new(id);
        wiring.fragments = fragments.iter().map(|f| f.id()).collect();
        wiring.hosted = fragments
            .iter()
            .flat_map(|f| HostedCapability::of(f))
            .collect();

        for requirement in self.requirements_for(revision, &fragments)? {
            if requirement.resolution() == Resolution::Dynamic {
                wiring.dynamic.push(requirement);
                continue;
            }
            let found = self.candidates(revision, &wiring, &requirement);
            let Found::Candidates(candidates) = found else {
                continue;
            };

            let mut accepted: Vec<RevisionId> = Vec::new();
            let mut rejected: Vec<String> = Vec::new();
            for candidate in candidates {
                if requirement.cardinality() == Cardinality::Single && !accepted.is_empty() {
                    break;
                }
                if accepted.contains(&candidate.provider) {
                    continue;
                }
                if self.resolve_revision(candidate.provider).is_ok() {
                    accepted.push(candidate.provider);
                    wiring.required.push(Wire {
                        provider: candidate.provider,
                        requirer: id,
                        capability: candidate.capability,
                        requirement: requirement.clone(),
                        declared_by: candidate.declared_by,
                    });
                } else {
                    rejected.push(candidate.to_string());
                }
            }

            if accepted.is_empty() && requirement.resolution() == Resolution::Mandatory {
                return Err(ResolveError::UnsatisfiedRequirement {
                    revision: id,
                    requirement: requirement.description(),
                    candidates: rejected,
                });
            }
        }
        Ok(wiring)
    }

    /// Declared, merged and synthetic requirements in resolution order.
    fn requirements_for(
        &self,
        revision: &Revision,
        fragments: &[Arc<Revision>],
    ) -> Result<Vec<Requirement>, ResolveError> {
        let mut out: Vec<Requirement> = revision
            .requirements()
            .iter()
            .filter(|r| r.is_effective())
            .cloned()
            .collect();
        for fragment in fragments {
            out.extend(
                fragment
                    .requirements()
                    .iter()
                    .filter(|r| r.is_effective() && r.namespace() != &Namespace::Host)
                    .cloned(),
            );
        }

        if let Some(bootstrap) = &self.ctx.policy.bootstrap
            && !revision.unit().is_system()
            && let Some(implicit) = bootstrap_requirement(bootstrap, &out)
        {
            out.push(implicit);
        }

        let aliases = &self.ctx.policy.ee_aliases;
        for source in std::iter::once(revision).chain(fragments.iter().map(Arc::as_ref)) {
            // Tokens were validated at install; a failure here means an
            // unrepresentable name and the requirement cannot be met.
            match ee::requirement(source.required_ee(), aliases) {
                Ok(Some(requirement)) => out.push(requirement),
                Ok(None) => {},
                Err(e) => {
                    return Err(ResolveError::UnsatisfiedRequirement {
                        revision: revision.id(),
                        requirement: e.to_string(),
                        candidates: Vec::new(),
                    });
                },
            }
        }
        Ok(out)
    }

    fn candidates(&self, revision: &Revision, wiring: &Wiring, requirement: &Requirement) -> Found {
        let id = revision.id();
        let graph = self.graph();
        let namespace = requirement.namespace();

        let mut all = graph.capabilities_of(namespace);
        for (host, fragments) in self.attachments.planned() {
            if graph.is_wired(host) || self.failed.contains_key(&host) {
                continue;
            }
            for fragment in fragments {
                let Some(f) = graph.revision(*fragment) else {
                    continue;
                };
                all.extend(
                    f.capabilities_in(namespace)
                        .filter(|c| c.namespace != Namespace::Identity)
                        .map(|c| Candidate {
                            provider: host,
                            declared_by: *fragment,
                            capability: c.clone(),
                        }),
                );
            }
        }
        // A host outside the plan brings its fragments along when wired.
        for (host, fragment) in self.attachments.prospective(graph, &self.excluded()) {
            let Some(f) = graph.revision(fragment) else {
                continue;
            };
            all.extend(
                f.capabilities_in(namespace)
                    .filter(|c| c.namespace != Namespace::Identity)
                    .map(|c| Candidate {
                        provider: host,
                        declared_by: fragment,
                        capability: c.clone(),
                    }),
            );
        }
        // Hosted capabilities of the revision being wired.
        all.extend(
            wiring
                .hosted
                .iter()
                .filter(|h| &h.capability.namespace == namespace)
                .map(|h| Candidate {
                    provider: id,
                    declared_by: h.declared_by,
                    capability: h.capability.clone(),
                }),
        );
        dedup(&mut all);

        let mut matching: Vec<Candidate> = all
            .into_iter()
            .filter(|c| !self.failed.contains_key(&c.provider))
            .filter(|c| matches(requirement, &c.capability))
            .collect();

        if namespace.excludes_self() {
            let had_self = matching.iter().any(|c| c.provider == id);
            matching.retain(|c| c.provider != id);
            if had_self && matching.is_empty() {
                debug!(revision = %id, requirement = %requirement, "Requirement satisfied internally");
                return Found::SelfSatisfied;
            }
        }

        if let Some(hook) = &self.ctx.policy.hook {
            hook.filter_candidates(revision, requirement, &mut matching);
        }
        rank(graph, &mut matching);
        Found::Candidates(matching)
    }
}

/// Drop exact duplicates (same provider, declarer and capability).
fn dedup(candidates: &mut Vec<Candidate>) {
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates.drain(..) {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    *candidates = out;
}

/// The implicit bootstrap import, unless a declared package requirement
/// already matches the bootstrap package.
fn bootstrap_requirement(bootstrap: &BootstrapImport, declared: &[Requirement]) -> Option<Requirement> {
    let capability = Capability::new(Namespace::Package)
        .with_attribute(Namespace::Package.as_str(), bootstrap.package.as_str())
        .with_attribute(trellis_core::attribute::VERSION, bootstrap.version.clone());
    if declared
        .iter()
        .any(|r| r.namespace() == &Namespace::Package && matches(r, &capability))
    {
        return None;
    }
    Requirement::with_filter(
        Namespace::Package,
        &format!("(package={})", escape_value(&bootstrap.package)),
    )
    .ok()
}
