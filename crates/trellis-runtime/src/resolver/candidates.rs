//! Candidate capabilities and their ranking.

use std::cmp::Ordering;
use std::fmt;

use trellis_core::{Capability, Requirement, RevisionId, Version};

use crate::graph::RevisionGraph;
use crate::unit::Revision;

/// A capability that might satisfy a requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Revision whose wiring would provide the capability.
    pub provider: RevisionId,
    /// Revision that declared it; differs from `provider` for hosted
    /// fragment capabilities.
    pub declared_by: RevisionId,
    /// The capability.
    pub capability: Capability,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.capability, self.provider)?;
        if self.declared_by != self.provider {
            write!(f, " (via {})", self.declared_by)?;
        }
        Ok(())
    }
}

/// Extension point consulted during every resolve.
///
/// Both methods default to allowing everything.
pub trait ResolverHook: Send + Sync {
    /// Remove candidates the requirer must not be wired to.
    fn filter_candidates(
        &self,
        _requirer: &Revision,
        _requirement: &Requirement,
        _candidates: &mut Vec<Candidate>,
    ) {
    }

    /// Return `false` to veto resolving `revision`.
    fn allow_resolve(&self, _revision: &Revision) -> bool {
        true
    }
}

/// Sort key of one candidate.
struct RankKey<'a> {
    in_use: bool,
    version: &'a Version,
    provider: RevisionId,
}

fn rank_key<'a>(graph: &'a RevisionGraph, candidate: &'a Candidate) -> RankKey<'a> {
    let in_use = graph
        .wiring(candidate.provider)
        .is_some_and(|w| w.is_in_use());
    let fallback = graph
        .revision(candidate.provider)
        .map(|r| r.version());
    let version = candidate
        .capability
        .version()
        .or(fallback)
        .unwrap_or(&EMPTY_VERSION);
    RankKey {
        in_use,
        version,
        provider: candidate.provider,
    }
}

static EMPTY_VERSION: Version = Version {
    major: 0,
    minor: 0,
    micro: 0,
    qualifier: String::new(),
};

fn compare_keys(a: &RankKey<'_>, b: &RankKey<'_>) -> Ordering {
    b.in_use
        .cmp(&a.in_use)
        .then_with(|| b.version.cmp(a.version))
        .then_with(|| a.provider.unit.cmp(&b.provider.unit))
        .then_with(|| b.provider.generation.cmp(&a.provider.generation))
}

/// Order candidates best first.
///
/// In-use providers come first, then higher versions, then lower unit ids,
/// then newer generations. The sort is stable, so candidates that tie on
/// every key keep their discovery order.
pub fn rank(graph: &RevisionGraph, candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| compare_keys(&rank_key(graph, a), &rank_key(graph, b)));
}

#[cfg(test)]
mod tests {
    use trellis_core::{Namespace, UnitId};

    use super::*;

    fn candidate(unit: u64, generation: u32, version: &str) -> Candidate {
        Candidate {
            provider: RevisionId::new(UnitId(unit), generation),
            declared_by: RevisionId::new(UnitId(unit), generation),
            capability: Capability::new(Namespace::Package)
                .with_attribute("package", "p")
                .with_attribute("version", Version::parse(version).unwrap()),
        }
    }

    #[test]
    fn test_rank_version_then_unit_then_generation() {
        let graph = RevisionGraph::new();
        let mut list = vec![
            candidate(3, 0, "1.0"),
            candidate(2, 0, "1.0"),
            candidate(4, 0, "2.0"),
            candidate(2, 1, "1.0"),
        ];
        rank(&graph, &mut list);
        let order: Vec<String> = list.iter().map(|c| c.provider.to_string()).collect();
        assert_eq!(order, vec!["4.0", "2.1", "2.0", "3.0"]);
    }

    #[test]
    fn test_candidate_display_mentions_host() {
        let mut c = candidate(1, 0, "1.0");
        c.declared_by = RevisionId::new(UnitId(5), 0);
        let text = c.to_string();
        assert!(text.contains("from 1.0"));
        assert!(text.contains("via 5.0"));
    }
}
