//! Fixed-point construction of the resolved graph.
//!
//! Each round traverses the graph from the root through the components
//! selected in the previous round, collects the selectors of every module
//! that is reached and selects a component per module. Rounds repeat until
//! no selection changes.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, warn};

use depot_core::{
    ComponentIdentifier, ComponentMetadata, ComponentSelector, DependencyMetadata, DepotError,
    DepotResult, ModuleIdentifier, ModuleVersionIdentifier, ResolveFailure,
};

use super::{ComponentNode, DependencyEdge, ResolvedGraph};
use crate::component::{ComponentRegistry, ComponentState, ComponentStateFactory};
use crate::conflict::{ConflictResolution, ConflictResolver};
use crate::repository::{ComponentIdResolveResult, DependencyToComponentIdResolver};
use crate::selectors::{
    ResolvableSelectorState, SelectionCause, SelectionReason, SelectorState, SelectorStateResolver,
};

/// Rounds allowed before selection is considered unstable
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Identifies one declared dependency edge across rounds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EdgeKey {
    from: ComponentIdentifier,
    target: String,
    constraint: bool,
}

impl EdgeKey {
    fn new(from: &ComponentIdentifier, dependency: &DependencyMetadata) -> Self {
        let target = match &dependency.selector {
            ComponentSelector::Module(selector) => selector.module.to_string(),
            ComponentSelector::Project(selector) => format!("{}{}", selector.build, selector.path),
        };
        Self {
            from: from.clone(),
            target,
            constraint: dependency.constraint,
        }
    }
}

/// A dependency edge found while traversing
#[derive(Debug)]
struct TraversedEdge {
    key: EdgeKey,
    target: ModuleIdentifier,
    dependency: DependencyMetadata,
}

/// Selectors of every reached module, in traversal order
#[derive(Debug, Default)]
struct Traversal {
    modules: IndexMap<ModuleIdentifier, Vec<Arc<SelectorState>>>,
    /// Modules pulled in by at least one non-constraint edge
    reached: HashSet<ModuleIdentifier>,
    edges: Vec<TraversedEdge>,
}

/// Result of resolving a root component
#[derive(Debug)]
pub struct Resolution {
    /// The root component
    pub root: ComponentIdentifier,
    /// Selected components and the edges between them
    pub graph: ResolvedGraph,
    /// Rounds needed to reach a stable selection
    pub iterations: usize,
    /// Resolution time in milliseconds
    pub resolution_time_ms: u64,
}

impl Resolution {
    /// The component selected for `module`
    pub fn selected(&self, module: &ModuleIdentifier) -> Option<&ComponentNode> {
        self.graph
            .components()
            .find(|node| &node.module_version.module == module && node.id != self.root)
    }

    /// Selected module versions, excluding the root and project components,
    /// sorted by coordinates
    pub fn module_versions(&self) -> Vec<ModuleVersionIdentifier> {
        let mut versions: Vec<ModuleVersionIdentifier> = self
            .graph
            .components()
            .filter(|node| node.id != self.root && !node.id.is_project())
            .map(|node| node.module_version.clone())
            .collect();
        versions.sort();
        versions
    }
}

/// Builds the resolved graph for a root component
pub struct DependencyGraphBuilder {
    resolver: Arc<dyn DependencyToComponentIdResolver>,
    registry: Arc<ComponentRegistry>,
    selector_resolver: SelectorStateResolver,
    max_iterations: usize,
    /// Selector state per declared edge, kept across rounds
    selectors: DashMap<EdgeKey, Arc<SelectorState>>,
    next_selector_id: AtomicU64,
}

impl DependencyGraphBuilder {
    pub fn new(resolver: Arc<dyn DependencyToComponentIdResolver>) -> Self {
        let registry = Arc::new(ComponentRegistry::new());
        Self {
            resolver,
            selector_resolver: SelectorStateResolver::new(
                ConflictResolver::default(),
                Arc::clone(&registry),
            ),
            registry,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            selectors: DashMap::new(),
            next_selector_id: AtomicU64::new(1),
        }
    }

    pub fn with_conflict_resolution(mut self, strategy: ConflictResolution) -> Self {
        self.selector_resolver =
            SelectorStateResolver::new(ConflictResolver::new(strategy), Arc::clone(&self.registry));
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Resolve the dependency graph of `root`
    pub fn resolve(&self, root: &ComponentMetadata) -> DepotResult<Resolution> {
        let start_time = Instant::now();
        let root_state = self
            .registry
            .component_for_id_resolve_result(&ComponentIdResolveResult::resolved_with_metadata(
                Arc::new(root.clone()),
            ))?;
        let root_module = root.module_version.module.clone();

        let mut selections: IndexMap<ModuleIdentifier, Arc<ComponentState>> = IndexMap::new();
        let mut active_edges: HashSet<EdgeKey> = HashSet::new();

        for iteration in 1..=self.max_iterations {
            let traversal = self.traverse(&root_state, &root_module, &selections)?;
            self.track_edges(&traversal, &mut active_edges)?;

            for component in selections.values() {
                component.clear_selection_reasons();
            }
            self.registry.reset_rejections();

            let groups: Vec<(ModuleIdentifier, Vec<&SelectorState>)> = traversal
                .modules
                .iter()
                .filter(|(module, _)| traversal.reached.contains(*module))
                .map(|(module, selectors)| {
                    (module.clone(), selectors.iter().map(Arc::as_ref).collect())
                })
                .collect();
            let selected = resolve_modules_parallel(&self.selector_resolver, &groups)?;

            let mut next: IndexMap<ModuleIdentifier, Arc<ComponentState>> =
                IndexMap::with_capacity(selected.len());
            let mut changed: Vec<ModuleIdentifier> = Vec::new();
            for ((module, component), (_, selectors)) in selected.into_iter().zip(&groups) {
                let unchanged = selections
                    .get(&module)
                    .is_some_and(|previous| Arc::ptr_eq(previous, &component));
                for selector in selectors {
                    for reason in selector.reasons_with_details() {
                        component.add_selection_reason(reason);
                    }
                    selector.override_selection(&component);
                    if !unchanged {
                        selector.mark_for_reuse();
                    }
                }
                self.apply_platform_force(&module, &component, selectors);
                if !unchanged {
                    changed.push(module.clone());
                }
                next.insert(module, component);
            }
            let dropped = selections.keys().any(|module| !next.contains_key(module));

            debug!(
                "Round {}: {} modules selected, {} changed",
                iteration,
                next.len(),
                changed.len()
            );

            if changed.is_empty() && !dropped {
                let graph = self.build_graph(&root_state, &root_module, &next, &traversal)?;
                if let Some(cycle) = graph.detect_cycles() {
                    warn!("Dependency cycle: {}", ResolvedGraph::format_cycle(&cycle));
                }
                return Ok(Resolution {
                    root: root_state.id().clone(),
                    graph,
                    iterations: iteration,
                    resolution_time_ms: start_time.elapsed().as_millis() as u64,
                });
            }
            if iteration == self.max_iterations {
                let module = changed
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| root_module.to_string());
                warn!("Selection of {} did not settle", module);
                return Err(DepotError::UnstableGraph {
                    module,
                    iterations: self.max_iterations,
                });
            }
            selections = next;
        }

        Err(DepotError::invalid_state("resolution ran no rounds"))
    }

    fn traverse(
        &self,
        root: &Arc<ComponentState>,
        root_module: &ModuleIdentifier,
        selections: &IndexMap<ModuleIdentifier, Arc<ComponentState>>,
    ) -> DepotResult<Traversal> {
        let mut traversal = Traversal::default();
        let mut visited: HashSet<ModuleIdentifier> = HashSet::from([root_module.clone()]);
        let mut queue: VecDeque<Arc<ComponentState>> = VecDeque::from([Arc::clone(root)]);

        while let Some(component) = queue.pop_front() {
            let Some(metadata) = self.metadata_of(&component) else {
                continue;
            };

            for dependency in &metadata.dependencies {
                let target = self.target_module(&dependency.selector)?;
                let key = EdgeKey::new(component.id(), dependency);

                if &target != root_module {
                    let selector = self.selector_for(&key, dependency, &target)?;
                    let selectors = traversal.modules.entry(target.clone()).or_default();
                    if !selectors.iter().any(|existing| Arc::ptr_eq(existing, &selector)) {
                        selectors.push(selector);
                    }
                    if !dependency.constraint {
                        traversal.reached.insert(target.clone());
                    }
                }

                if !dependency.constraint && visited.insert(target.clone()) {
                    if let Some(selected) = selections.get(&target) {
                        queue.push_back(Arc::clone(selected));
                    }
                }
                traversal.edges.push(TraversedEdge {
                    key,
                    target,
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(traversal)
    }

    fn metadata_of(&self, component: &ComponentState) -> Option<Arc<ComponentMetadata>> {
        component
            .metadata()
            .cloned()
            .or_else(|| self.resolver.metadata(component.id()))
    }

    fn target_module(&self, selector: &ComponentSelector) -> DepotResult<ModuleIdentifier> {
        if let Some(module) = self.resolver.target_module(selector) {
            return Ok(module);
        }
        Err(match selector {
            ComponentSelector::Project(project) => DepotError::Unresolved(ResolveFailure::ProjectNotFound {
                build: project.build.clone(),
                path: project.path.clone(),
            }),
            ComponentSelector::Module(_) => DepotError::Unresolved(ResolveFailure::NotFound {
                selector: selector.to_string(),
            }),
        })
    }

    /// Selector state of an edge. A repeated declaration of the same edge is
    /// merged into the existing state.
    fn selector_for(
        &self,
        key: &EdgeKey,
        dependency: &DependencyMetadata,
        target: &ModuleIdentifier,
    ) -> DepotResult<Arc<SelectorState>> {
        if let Some(existing) = self.selectors.get(key) {
            existing.update(dependency)?;
            return Ok(Arc::clone(&existing));
        }

        let state = Arc::new(SelectorState::new(
            self.next_selector_id.fetch_add(1, Ordering::Relaxed),
            dependency.clone(),
            target.clone(),
            Arc::clone(&self.resolver),
        )?);
        let entry = self.selectors.entry(key.clone()).or_insert(state);
        Ok(Arc::clone(&entry))
    }

    /// Count edges that appeared and release edges that went away
    fn track_edges(&self, traversal: &Traversal, active: &mut HashSet<EdgeKey>) -> DepotResult<()> {
        let current: HashSet<EdgeKey> = traversal
            .edges
            .iter()
            .filter(|edge| self.selectors.contains_key(&edge.key))
            .map(|edge| edge.key.clone())
            .collect();

        for key in current.difference(active) {
            if let Some(selector) = self.selectors.get(key) {
                selector.use_edge();
            }
        }
        for key in active.difference(&current) {
            if let Some(selector) = self.selectors.get(key) {
                if selector.release_edge()? {
                    debug!("Selector {} no longer used", selector.value());
                }
            }
        }
        *active = current;
        Ok(())
    }

    /// A hard-forced platform caps the versions of its members
    fn apply_platform_force(
        &self,
        module: &ModuleIdentifier,
        component: &ComponentState,
        selectors: &[&SelectorState],
    ) {
        let Some(platform) = self.registry.platform(module) else {
            return;
        };
        let forced = selectors
            .iter()
            .any(|selector| selector.is_force() && !selector.is_soft_force());
        if forced && platform.forced_version().as_deref() != Some(component.version()) {
            debug!("Platform {} forced to {}", module, component.version());
            platform.force_version(component.version());
        }
    }

    fn build_graph(
        &self,
        root: &Arc<ComponentState>,
        root_module: &ModuleIdentifier,
        selections: &IndexMap<ModuleIdentifier, Arc<ComponentState>>,
        traversal: &Traversal,
    ) -> DepotResult<ResolvedGraph> {
        let mut graph = ResolvedGraph::new();
        graph.add_component(
            ComponentNode::new(root.id().clone(), root.module_version().clone())
                .with_reasons(vec![SelectionReason::new(SelectionCause::Root)]),
        );
        for component in selections.values() {
            graph.add_component(
                ComponentNode::new(component.id().clone(), component.module_version().clone())
                    .with_reasons(component.selection_reasons()),
            );
        }

        for edge in &traversal.edges {
            let target = if &edge.target == root_module {
                Some(root)
            } else {
                selections.get(&edge.target)
            };
            if let Some(target) = target {
                graph.add_dependency(
                    &edge.key.from,
                    target.id(),
                    DependencyEdge::new(edge.dependency.clone()),
                )?;
            }
        }
        Ok(graph)
    }
}

impl std::fmt::Debug for DependencyGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraphBuilder")
            .field("conflict_resolution", &self.selector_resolver.conflict_resolver().strategy())
            .field("max_iterations", &self.max_iterations)
            .field("selectors", &self.selectors.len())
            .finish()
    }
}

/// Select a component for each module group in parallel.
///
/// Groups must target distinct modules; each runs its own accumulator.
pub fn resolve_modules_parallel<S>(
    resolver: &SelectorStateResolver,
    groups: &[(ModuleIdentifier, Vec<&S>)],
) -> DepotResult<Vec<(ModuleIdentifier, Arc<ComponentState>)>>
where
    S: ResolvableSelectorState + Sync,
{
    groups
        .par_iter()
        .map(|(module, selectors)| {
            resolver
                .select_best(module, selectors)
                .map(|component| (module.clone(), component))
        })
        .collect()
}
