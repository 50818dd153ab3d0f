//! Dependency graph construction and queries.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use pkgdex_core::name;
use pkgdex_core::record::{PackageKey, PackageRecord};
use pkgdex_core::requirement::Requirement;
use pkgdex_core::warning::Warning;

/// A node in the dependency graph.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum GraphNode {
    /// One released artifact; the source of dependency edges.
    Release(PackageKey),
    /// A project name; the target of dependency edges.
    Project(String),
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Release(key) => write!(f, "{key}"),
            GraphNode::Project(name) => f.write_str(name),
        }
    }
}

/// Edge label: the requirement a release places on a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub from: PackageKey,
    pub requirement: Requirement,
}

impl DepEdge {
    /// Canonical name of the required project.
    pub fn target(&self) -> &str {
        &self.requirement.name
    }
}

/// Release and project nodes joined by requirement edges, backed by petgraph.
///
/// The graph records constraints only; it never picks versions.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<GraphNode, DepEdge>,
    releases: HashMap<PackageKey, NodeIndex>,
    projects: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record's requirements as edges. See [`DependencyGraph::add_release`].
    pub fn add_record(&mut self, record: &PackageRecord) -> Vec<Warning> {
        self.add_release(record.key(), record.requirements.iter().cloned())
    }

    /// Add or replace a release node with one edge per requirement.
    ///
    /// Re-adding a key drops its previous outgoing edges. Requirements on the
    /// release's own name are dropped with a [`Warning::SelfDependency`].
    pub fn add_release<I>(&mut self, key: PackageKey, requirements: I) -> Vec<Warning>
    where
        I: IntoIterator<Item = Requirement>,
    {
        let mut warnings = Vec::new();
        let from = match self.releases.get(&key) {
            Some(&idx) => {
                let stale: Vec<_> = self
                    .graph
                    .edges_directed(idx, Direction::Outgoing)
                    .map(|e| e.id())
                    .collect();
                for edge in stale {
                    self.graph.remove_edge(edge);
                }
                idx
            }
            None => {
                let idx = self.graph.add_node(GraphNode::Release(key.clone()));
                self.releases.insert(key.clone(), idx);
                idx
            }
        };

        for requirement in requirements {
            debug_assert_eq!(requirement.name, name::canonicalize(&requirement.name));
            if requirement.name == key.name {
                tracing::debug!("{key}: dropping requirement on itself");
                warnings.push(Warning::SelfDependency {
                    name: key.name.clone(),
                    version: key.version.to_string(),
                });
                continue;
            }
            let to = self.project_node(&requirement.name);
            self.graph.add_edge(
                from,
                to,
                DepEdge {
                    from: key.clone(),
                    requirement,
                },
            );
        }
        warnings
    }

    fn project_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.projects.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Project(name.to_string()));
        self.projects.insert(name.to_string(), idx);
        idx
    }

    pub fn contains(&self, key: &PackageKey) -> bool {
        self.releases.contains_key(key)
    }

    /// Number of release nodes.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges of a release, ordered by target name then requirement text.
    pub fn dependencies_of(&self, key: &PackageKey) -> Vec<&DepEdge> {
        let Some(&idx) = self.releases.get(key) else {
            return Vec::new();
        };
        let mut edges: Vec<&DepEdge> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.weight())
            .collect();
        edges.sort_by_cached_key(|e| (e.requirement.name.clone(), e.requirement.to_string()));
        edges
    }

    /// Releases with at least one edge targeting `project`.
    pub fn dependents_of(&self, project: &str) -> BTreeSet<PackageKey> {
        let Some(&idx) = self.projects.get(project) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.weight().from.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgdex_core::version::VersionSpec;

    fn key(name: &str, version: &str) -> PackageKey {
        PackageKey::new(name, VersionSpec::parse(version).unwrap())
    }

    fn reqs(texts: &[&str]) -> Vec<Requirement> {
        texts.iter().map(|t| Requirement::parse(t).unwrap()).collect()
    }

    #[test]
    fn add_and_query_edges() {
        let mut g = DependencyGraph::new();
        let warnings = g.add_release(key("acme", "1.0"), reqs(&["widget >=1,<2", "bolt"]));
        assert!(warnings.is_empty());
        assert!(g.contains(&key("acme", "1.0")));
        assert_eq!(g.len(), 1);

        let deps = g.dependencies_of(&key("acme", "1.0"));
        let targets: Vec<&str> = deps.iter().map(|e| e.target()).collect();
        assert_eq!(targets, vec!["bolt", "widget"]);
        assert_eq!(deps[1].from, key("acme", "1.0"));
    }

    #[test]
    fn self_dependency_is_dropped() {
        let mut g = DependencyGraph::new();
        let warnings = g.add_release(key("acme", "1.0"), reqs(&["acme[extra]", "widget"]));
        assert_eq!(
            warnings,
            vec![Warning::SelfDependency {
                name: "acme".into(),
                version: "1.0".into()
            }]
        );
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn readding_replaces_edges() {
        let mut g = DependencyGraph::new();
        g.add_release(key("acme", "1.0"), reqs(&["widget", "bolt"]));
        g.add_release(key("acme", "1.0"), reqs(&["nut"]));
        assert_eq!(g.len(), 1);
        assert_eq!(g.edge_count(), 1);
        assert!(g.dependents_of("widget").is_empty());
        assert_eq!(g.dependents_of("nut").len(), 1);
    }

    #[test]
    fn dependents_span_versions() {
        let mut g = DependencyGraph::new();
        g.add_release(key("acme", "1.0"), reqs(&["widget"]));
        g.add_release(key("acme", "2.0"), reqs(&["widget>=2"]));
        g.add_release(key("gizmo", "0.1"), reqs(&["bolt"]));
        let dependents: Vec<String> = g.dependents_of("widget").iter().map(|k| k.to_string()).collect();
        assert_eq!(dependents, vec!["acme 1.0", "acme 2.0"]);
        assert!(g.dependents_of("unknown").is_empty());
    }
}
