//! Resolved dependency graph using petgraph
//!
//! Provides the graph of selected components produced by the
//! [`DependencyGraphBuilder`], with cycle detection and topological
//! ordering.

mod builder;

pub use builder::{
    resolve_modules_parallel, DependencyGraphBuilder, Resolution, DEFAULT_MAX_ITERATIONS,
};

use std::collections::HashSet;

use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use depot_core::{
    ComponentIdentifier, DependencyMetadata, DepotError, DepotResult, ModuleVersionIdentifier,
};

use crate::selectors::SelectionReason;

/// Node in the resolved graph representing a selected component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Selected component
    pub id: ComponentIdentifier,
    /// Module and version of the component
    pub module_version: ModuleVersionIdentifier,
    /// Why the component was selected
    pub reasons: Vec<SelectionReason>,
}

/// Edge in the resolved graph: a declared dependency and what it asked for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependency: DependencyMetadata,
}

/// Graph of selected components
#[derive(Debug)]
pub struct ResolvedGraph {
    /// Underlying directed graph
    graph: DiGraph<ComponentNode, DependencyEdge>,
    /// Map from component to node for fast lookups
    node_map: DashMap<ComponentIdentifier, NodeIndex>,
}

impl ResolvedGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: DashMap::new(),
        }
    }

    /// Add a component node. Adding a known component returns its node.
    pub fn add_component(&mut self, node: ComponentNode) -> NodeIndex {
        if let Some(existing) = self.node_map.get(&node.id) {
            return *existing;
        }
        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_map.insert(id, index);
        index
    }

    /// Add a dependency edge between two components already in the graph
    pub fn add_dependency(
        &mut self,
        from: &ComponentIdentifier,
        to: &ComponentIdentifier,
        edge: DependencyEdge,
    ) -> DepotResult<()> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        self.graph.add_edge(from_index, to_index, edge);
        Ok(())
    }

    fn index_of(&self, id: &ComponentIdentifier) -> DepotResult<NodeIndex> {
        self.node_map
            .get(id)
            .map(|index| *index)
            .ok_or_else(|| DepotError::invalid_state(format!("component not in graph: {}", id)))
    }

    pub fn get_component(&self, id: &ComponentIdentifier) -> Option<&ComponentNode> {
        let index = self.node_map.get(id)?;
        self.graph.node_weight(*index)
    }

    /// All components in insertion order
    pub fn components(&self) -> impl Iterator<Item = &ComponentNode> {
        self.graph.node_weights()
    }

    /// Components `id` depends on, with the edges leading to them
    pub fn dependencies_of(&self, id: &ComponentIdentifier) -> Vec<(&ComponentNode, &DependencyEdge)> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// Components depending on `id`, with the edges leading from them
    pub fn dependents_of(&self, id: &ComponentIdentifier) -> Vec<(&ComponentNode, &DependencyEdge)> {
        self.neighbours(id, Direction::Incoming)
    }

    fn neighbours(
        &self,
        id: &ComponentIdentifier,
        direction: Direction,
    ) -> Vec<(&ComponentNode, &DependencyEdge)> {
        let Some(index) = self.node_map.get(id).map(|index| *index) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(index, direction)
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                Some((self.graph.node_weight(other)?, edge.weight()))
            })
            .collect()
    }

    pub fn component_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Find a dependency cycle, if there is one
    pub fn detect_cycles(&self) -> Option<Vec<ComponentIdentifier>> {
        use petgraph::algo::tarjan_scc;

        tarjan_scc(&self.graph).into_iter().find_map(|component| {
            let cyclic = component.len() > 1
                || self.graph.contains_edge(component[0], component[0]);
            cyclic.then(|| self.extract_cycle_path(&component))
        })
    }

    /// Walk a strongly connected component until a node repeats
    fn extract_cycle_path(&self, component: &[NodeIndex]) -> Vec<ComponentIdentifier> {
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut current = component[0];

        loop {
            if let Some(start) = path.iter().position(|index| *index == current) {
                return path[start..]
                    .iter()
                    .filter_map(|index| self.graph.node_weight(*index))
                    .map(|node| node.id.clone())
                    .collect();
            }
            path.push(current);

            let next = self
                .graph
                .edges(current)
                .map(|edge| edge.target())
                .find(|target| members.contains(target));
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        path.iter()
            .filter_map(|index| self.graph.node_weight(*index))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Format a cycle as "a -> b -> a"
    pub fn format_cycle(cycle: &[ComponentIdentifier]) -> String {
        let Some(first) = cycle.first() else {
            return "No cycle".to_string();
        };
        let mut names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        names.push(first.to_string());
        names.join(" -> ")
    }

    /// Check for cycles and return a detailed error if one is found
    pub fn validate_no_cycles(&self) -> DepotResult<()> {
        match self.detect_cycles() {
            None => Ok(()),
            Some(cycle) => Err(DepotError::CircularDependency {
                cycle: Self::format_cycle(&cycle),
            }),
        }
    }

    /// Components in topological order, dependents before their dependencies
    pub fn topological_sort(&self) -> DepotResult<Vec<ComponentIdentifier>> {
        use petgraph::algo::toposort;

        match toposort(&self.graph, None) {
            Ok(sorted) => Ok(sorted
                .into_iter()
                .filter_map(|index| self.graph.node_weight(index))
                .map(|node| node.id.clone())
                .collect()),
            Err(_) => {
                let cycle = self.detect_cycles().unwrap_or_default();
                Err(DepotError::CircularDependency {
                    cycle: Self::format_cycle(&cycle),
                })
            },
        }
    }
}

impl Default for ResolvedGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentNode {
    pub fn new(id: ComponentIdentifier, module_version: ModuleVersionIdentifier) -> Self {
        Self {
            id,
            module_version,
            reasons: Vec::new(),
        }
    }

    pub fn with_reasons(mut self, reasons: Vec<SelectionReason>) -> Self {
        self.reasons = reasons;
        self
    }
}

impl DependencyEdge {
    pub fn new(dependency: DependencyMetadata) -> Self {
        Self { dependency }
    }

    /// Whether the edge only constrains the target
    pub fn is_constraint(&self) -> bool {
        self.dependency.constraint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ModuleIdentifier;

    fn node(name: &str) -> ComponentNode {
        let module = ModuleIdentifier::new("org", name);
        ComponentNode::new(ComponentIdentifier::module(module.clone(), "1.0"), module.with_version("1.0"))
    }

    fn edge(to: &str) -> DependencyEdge {
        DependencyEdge::new(DependencyMetadata::requiring(ModuleIdentifier::new("org", to), "1.0"))
    }

    fn graph_with(names: &[&str], edges: &[(&str, &str)]) -> (ResolvedGraph, Vec<ComponentIdentifier>) {
        let mut graph = ResolvedGraph::new();
        let ids: Vec<ComponentIdentifier> = names
            .iter()
            .map(|name| {
                let node = node(name);
                let id = node.id.clone();
                graph.add_component(node);
                id
            })
            .collect();
        for (from, to) in edges {
            let from = names.iter().position(|n| n == from).unwrap();
            let to_index = names.iter().position(|n| n == to).unwrap();
            graph.add_dependency(&ids[from], &ids[to_index], edge(to)).unwrap();
        }
        (graph, ids)
    }

    #[test]
    fn test_graph_creation() {
        let graph = ResolvedGraph::new();
        assert_eq!(graph.component_count(), 0);
        assert_eq!(graph.dependency_count(), 0);
        assert!(graph.detect_cycles().is_none());
    }

    #[test]
    fn test_add_component() {
        let mut graph = ResolvedGraph::new();
        let first = graph.add_component(node("a"));
        let second = graph.add_component(node("a"));
        assert_eq!(first, second);
        assert_eq!(graph.component_count(), 1);
        assert!(graph.get_component(&node("a").id).is_some());
    }

    #[test]
    fn test_add_dependency_missing_component() {
        let mut graph = ResolvedGraph::new();
        graph.add_component(node("a"));
        let result = graph.add_dependency(&node("a").id, &node("b").id, edge("b"));
        assert!(matches!(result, Err(DepotError::InvalidState { .. })));
    }

    #[test]
    fn test_neighbours() {
        let (graph, ids) = graph_with(&["a", "b", "c"], &[("a", "b"), ("a", "c"), ("b", "c")]);
        assert_eq!(graph.dependencies_of(&ids[0]).len(), 2);
        let dependents: Vec<_> = graph
            .dependents_of(&ids[2])
            .into_iter()
            .map(|(node, _)| node.id.clone())
            .collect();
        assert_eq!(dependents.len(), 2);
        assert!(dependents.contains(&ids[0]));
        assert!(graph.dependents_of(&node("zzz").id).is_empty());
    }

    #[test]
    fn test_cycle_detection_no_cycle() {
        let (graph, _) = graph_with(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert!(graph.detect_cycles().is_none());
        assert!(graph.validate_no_cycles().is_ok());
    }

    #[test]
    fn test_cycle_detection_with_cycle() {
        let (graph, _) = graph_with(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let cycle = graph.detect_cycles().unwrap();
        assert_eq!(cycle.len(), 3);

        let formatted = ResolvedGraph::format_cycle(&cycle);
        assert!(formatted.contains("org:a:1.0"));
        assert!(formatted.contains("org:b:1.0"));
        assert!(formatted.contains("org:c:1.0"));
        assert_eq!(formatted.matches("->").count(), 3);
    }

    #[test]
    fn test_cycle_path_skips_exits() {
        // a -> d leaves the cycle; the reported path must stay inside it
        let (graph, ids) = graph_with(
            &["a", "b", "d"],
            &[("a", "d"), ("a", "b"), ("b", "a")],
        );
        let cycle = graph.detect_cycles().unwrap();
        assert_eq!(cycle.len(), 2);
        assert!(!cycle.contains(&ids[2]));
    }

    #[test]
    fn test_self_loop() {
        let (graph, _) = graph_with(&["a"], &[("a", "a")]);
        let cycle = graph.detect_cycles().unwrap();
        assert_eq!(ResolvedGraph::format_cycle(&cycle), "org:a:1.0 -> org:a:1.0");
    }

    #[test]
    fn test_topological_sort() {
        let (graph, ids) = graph_with(&["a", "b", "c"], &[("a", "b"), ("a", "c"), ("b", "c")]);
        let sorted = graph.topological_sort().unwrap();
        assert_eq!(sorted.len(), 3);

        let position = |id: &ComponentIdentifier| sorted.iter().position(|s| s == id).unwrap();
        assert!(position(&ids[0]) < position(&ids[1]));
        assert!(position(&ids[1]) < position(&ids[2]));
    }

    #[test]
    fn test_validate_no_cycles() {
        let (graph, _) = graph_with(&["a", "b"], &[("a", "b"), ("b", "a")]);
        match graph.validate_no_cycles() {
            Err(DepotError::CircularDependency { cycle }) => assert!(cycle.contains("->")),
            other => panic!("expected a cycle, got {:?}", other),
        }
        assert!(graph.topological_sort().is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use depot_core::ModuleIdentifier;
    use proptest::prelude::*;

    fn build(count: usize, edges: &[(usize, usize)], forward_only: bool) -> (ResolvedGraph, Vec<ComponentIdentifier>) {
        let mut graph = ResolvedGraph::new();
        let mut ids = Vec::new();
        for i in 0..count {
            let module = ModuleIdentifier::new("org", format!("m{}", i));
            let node = ComponentNode::new(
                ComponentIdentifier::module(module.clone(), "1.0"),
                module.with_version("1.0"),
            );
            ids.push(node.id.clone());
            graph.add_component(node);
        }
        for &(from, to) in edges {
            let keep = from < count && to < count && if forward_only { from < to } else { from != to };
            if keep {
                let dependency = DependencyMetadata::requiring(ModuleIdentifier::new("org", format!("m{}", to)), "1.0");
                graph.add_dependency(&ids[from], &ids[to], DependencyEdge::new(dependency)).unwrap();
            }
        }
        (graph, ids)
    }

    proptest! {
        #[test]
        fn cycle_detection_correctness(
            count in 3usize..8,
            edges in prop::collection::vec((0usize..7, 0usize..7), 0..15)
        ) {
            let (graph, _) = build(count, &edges, false);
            let has_cycle = graph.detect_cycles().is_some();

            prop_assert_eq!(graph.topological_sort().is_err(), has_cycle);
            prop_assert_eq!(graph.validate_no_cycles().is_err(), has_cycle);
        }

        #[test]
        fn reported_cycle_is_closed(
            count in 2usize..7,
            edges in prop::collection::vec((0usize..6, 0usize..6), 1..15)
        ) {
            let (graph, ids) = build(count, &edges, false);
            if let Some(cycle) = graph.detect_cycles() {
                for (i, from) in cycle.iter().enumerate() {
                    let to = &cycle[(i + 1) % cycle.len()];
                    let targets: Vec<_> = graph
                        .dependencies_of(from)
                        .into_iter()
                        .map(|(node, _)| node.id.clone())
                        .collect();
                    prop_assert!(targets.contains(to), "{} does not depend on {}", from, to);
                    prop_assert!(ids.contains(from));
                }
            }
        }

        #[test]
        fn topological_sort_validity(
            count in 2usize..6,
            edges in prop::collection::vec((0usize..5, 0usize..5), 0..10)
        ) {
            let (graph, ids) = build(count, &edges, true);
            let sorted = graph.topological_sort().unwrap();

            prop_assert_eq!(sorted.len(), count);
            let unique: HashSet<_> = sorted.iter().collect();
            prop_assert_eq!(unique.len(), sorted.len());
            for id in &ids {
                prop_assert!(sorted.contains(id), "{} missing from sort", id);
            }
        }
    }
}
