//! Package dependency graph (workspace-internal imports only).

use crate::workspace::PackageId;
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    imports: BTreeMap<PackageId, BTreeSet<PackageId>>,
    importers: BTreeMap<PackageId, BTreeSet<PackageId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, pkg: PackageId) {
        self.imports.entry(pkg).or_default();
        self.importers.entry(pkg).or_default();
    }

    /// Record that `from` imports `to`.
    pub fn add_edge(&mut self, from: PackageId, to: PackageId) {
        self.add_package(from);
        self.add_package(to);
        self.imports.entry(from).or_default().insert(to);
        self.importers.entry(to).or_default().insert(from);
    }

    pub fn remove_edge(&mut self, from: PackageId, to: PackageId) {
        if let Some(set) = self.imports.get_mut(&from) {
            set.remove(&to);
        }
        if let Some(set) = self.importers.get_mut(&to) {
            set.remove(&from);
        }
    }

    /// Packages directly imported by `pkg`.
    pub fn imports_of(&self, pkg: PackageId) -> impl Iterator<Item = PackageId> + '_ {
        self.imports.get(&pkg).into_iter().flatten().copied()
    }

    /// Packages that directly import `pkg`.
    pub fn importers_of(&self, pkg: PackageId) -> impl Iterator<Item = PackageId> + '_ {
        self.importers.get(&pkg).into_iter().flatten().copied()
    }

    pub fn imports_directly(&self, from: PackageId, to: PackageId) -> bool {
        self.imports.get(&from).is_some_and(|s| s.contains(&to))
    }

    /// True when a chain of imports leads from `from` to `to`.
    pub fn transitively_imports(&self, from: PackageId, to: PackageId) -> bool {
        if from == to {
            return false;
        }
        let graph = self.to_graphmap();
        graph.contains_node(from)
            && graph.contains_node(to)
            && has_path_connecting(&graph, from, to, None)
    }

    /// Adding the edge `from -> to` closes a cycle when `to` already reaches
    /// `from`.
    pub fn would_create_cycle(&self, from: PackageId, to: PackageId) -> bool {
        from == to || self.transitively_imports(to, from)
    }

    /// Every strongly connected component with more than one package (or a
    /// self import), each sorted.
    pub fn cycles(&self) -> Vec<Vec<PackageId>> {
        let graph = self.to_graphmap();
        let mut cycles: Vec<Vec<PackageId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || scc.iter().any(|p| self.imports_directly(*p, *p)))
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn has_cycle(&self) -> bool {
        !self.cycles().is_empty()
    }

    pub fn packages(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.imports.keys().copied()
    }

    fn to_graphmap(&self) -> DiGraphMap<PackageId, ()> {
        let mut graph = DiGraphMap::new();
        for (from, targets) in &self.imports {
            graph.add_node(*from);
            for to in targets {
                graph.add_edge(*from, *to, ());
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: u32) -> PackageId {
        PackageId(n)
    }

    #[test]
    fn reachability_and_cycle_prediction() {
        let mut g = DependencyGraph::new();
        g.add_edge(p(0), p(1));
        g.add_edge(p(1), p(2));

        assert!(g.transitively_imports(p(0), p(2)));
        assert!(!g.transitively_imports(p(2), p(0)));
        assert!(g.would_create_cycle(p(2), p(0)));
        assert!(!g.would_create_cycle(p(0), p(2)));
        assert!(g.would_create_cycle(p(1), p(1)));
        assert!(!g.has_cycle());
    }

    #[test]
    fn tarjan_reports_cycles() {
        let mut g = DependencyGraph::new();
        g.add_edge(p(0), p(1));
        g.add_edge(p(1), p(2));
        g.add_edge(p(2), p(0));
        g.add_edge(p(3), p(0));

        assert_eq!(g.cycles(), vec![vec![p(0), p(1), p(2)]]);
        g.remove_edge(p(2), p(0));
        assert!(g.cycles().is_empty());
        assert_eq!(g.importers_of(p(0)).collect::<Vec<_>>(), vec![p(3)]);
    }
}
