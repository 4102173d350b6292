//! Portability graph for runtime identifiers (RIDs).
//!
//! Two disjoint static maps: *portable* RIDs (version-agnostic, safe to ship
//! in project files) and *non-portable* RIDs (distro- or OS-version-specific),
//! each non-portable entry carrying import edges toward more general
//! identifiers. Resolving a non-portable RID walks those edges and picks the
//! most specific portable identifier reachable.
//!
//! The graph ships as `data/rid-graph.json`, embedded at compile time and
//! parsed once; it is immutable for the life of the process.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::OnceLock;
use tracing::trace;

/// The generic root every chain ultimately reaches. Deprioritized when
/// ranking candidates of equal length.
const GENERIC_ROOT: &str = "any";

#[derive(Debug, Deserialize)]
struct GraphData {
    portable: BTreeSet<String>,
    nonportable: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug)]
pub struct PortabilityGraph {
    portable: BTreeSet<String>,
    nonportable: BTreeMap<String, BTreeSet<String>>,
}

impl PortabilityGraph {
    /// The built-in graph, parsed once on first use.
    pub fn builtin() -> &'static PortabilityGraph {
        static GRAPH: OnceLock<PortabilityGraph> = OnceLock::new();
        GRAPH.get_or_init(|| {
            PortabilityGraph::from_json(include_str!("../data/rid-graph.json"))
                .expect("embedded rid-graph.json is well-formed")
        })
    }

    pub fn from_json(json: &str) -> anyhow::Result<PortabilityGraph> {
        let data: GraphData = serde_json::from_str(json)?;
        anyhow::ensure!(
            data.portable.contains(GENERIC_ROOT),
            "graph is missing the generic root '{GENERIC_ROOT}'"
        );
        Ok(PortabilityGraph {
            portable: data.portable,
            nonportable: data.nonportable,
        })
    }

    pub fn is_portable(&self, rid: &str) -> bool {
        self.portable.contains(rid)
    }

    pub fn is_known(&self, rid: &str) -> bool {
        self.portable.contains(rid) || self.nonportable.contains_key(rid)
    }

    /// The most specific portable equivalent of `rid`.
    ///
    /// Already-portable identifiers map to themselves; unknown identifiers
    /// map to `None`. For non-portable identifiers, every portable RID
    /// reachable over import edges is collected and ranked: longest name
    /// first, with the generic root losing ties.
    pub fn portable_equivalent<'a>(&'a self, rid: &'a str) -> Option<&'a str> {
        if let Some(found) = self.portable.get(rid) {
            return Some(found.as_str());
        }
        if !self.nonportable.contains_key(rid) {
            return None;
        }

        // Visited-set-guarded traversal: the data is expected acyclic, but a
        // cycle in a hand-edited graph must not hang resolution.
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut candidates: Vec<&str> = Vec::new();
        queue.push_back(rid);
        visited.insert(rid);

        while let Some(current) = queue.pop_front() {
            let Some(imports) = self.nonportable.get(current) else {
                continue;
            };
            for next in imports {
                if !visited.insert(next.as_str()) {
                    continue;
                }
                if let Some(found) = self.portable.get(next.as_str()) {
                    candidates.push(found.as_str());
                } else {
                    queue.push_back(next.as_str());
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| (*a == GENERIC_ROOT).cmp(&(*b == GENERIC_ROOT)))
                .then_with(|| a.cmp(b))
        });

        let best = candidates.first().copied();
        trace!(rid, ?best, "portable equivalent resolved");
        best
    }

    /// Non-portable identifiers known to the graph (test support).
    pub fn nonportable_ids(&self) -> impl Iterator<Item = &str> {
        self.nonportable.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distro_versioned_rid_resolves_to_arch_specific_portable() {
        let g = PortabilityGraph::builtin();
        assert_eq!(g.portable_equivalent("ubuntu.22.04-x64"), Some("linux-x64"));
        assert_eq!(g.portable_equivalent("win10-x64"), Some("win-x64"));
        assert_eq!(g.portable_equivalent("osx.13-arm64"), Some("osx-arm64"));
    }

    #[test]
    fn musl_distros_prefer_musl_flavored_portables() {
        let g = PortabilityGraph::builtin();
        assert_eq!(
            g.portable_equivalent("alpine.3.18-x64"),
            Some("linux-musl-x64")
        );
    }

    #[test]
    fn architecture_less_rid_resolves_to_os_portable() {
        let g = PortabilityGraph::builtin();
        assert_eq!(g.portable_equivalent("ubuntu"), Some("linux"));
        assert_eq!(g.portable_equivalent("win10"), Some("win"));
    }

    #[test]
    fn portable_rid_maps_to_itself() {
        let g = PortabilityGraph::builtin();
        assert!(g.is_portable("linux-x64"));
        assert_eq!(g.portable_equivalent("linux-x64"), Some("linux-x64"));
    }

    #[test]
    fn unknown_rid_is_none() {
        let g = PortabilityGraph::builtin();
        assert!(!g.is_known("plan9-x64"));
        assert_eq!(g.portable_equivalent("plan9-x64"), None);
    }

    // Testable property: every non-portable entry reaches a portable one,
    // and resolution is idempotent.
    #[test]
    fn every_nonportable_rid_resolves_and_is_idempotent() {
        let g = PortabilityGraph::builtin();
        for rid in g.nonportable_ids() {
            let eq = g
                .portable_equivalent(rid)
                .unwrap_or_else(|| panic!("{rid} has no portable equivalent"));
            assert!(g.is_portable(eq), "{rid} resolved to non-portable {eq}");
            assert_eq!(g.portable_equivalent(eq), Some(eq));
        }
    }

    #[test]
    fn generic_root_loses_ties_and_search_tolerates_cycles() {
        let g = PortabilityGraph::from_json(
            r#"{
                "portable": ["any", "abc"],
                "nonportable": {
                    "loop-a": ["loop-b", "abc", "any"],
                    "loop-b": ["loop-a"]
                }
            }"#,
        )
        .expect("graph");
        assert_eq!(g.portable_equivalent("loop-a"), Some("abc"));
        assert_eq!(g.portable_equivalent("loop-b"), Some("abc"));
    }

    #[test]
    fn graph_without_root_is_rejected() {
        assert!(PortabilityGraph::from_json(r#"{"portable": [], "nonportable": {}}"#).is_err());
    }
}
