//! Resolution of dependency selectors to component identifiers
//!
//! [`DependencyToComponentIdResolver`] is the seam between the resolution
//! engine and wherever components come from. [`InMemoryRepository`] serves
//! components registered up front, which is what manifests, tests and
//! benchmarks use.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use depot_core::{
    ComponentIdentifier, ComponentMetadata, ComponentSelector, DependencyMetadata,
    ModuleIdentifier, ModuleVersionIdentifier, ResolveFailure, Version,
};
use depot_core::types::{ModuleComponentSelector, ProjectComponentSelector};

use crate::semver::VersionSelector;

/// A selector resolved to a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedComponentId {
    pub id: ComponentIdentifier,
    pub module_version: ModuleVersionIdentifier,
    pub metadata: Option<Arc<ComponentMetadata>>,
}

/// Outcome of resolving one selector against a repository.
///
/// Failures are carried as values; only the final extraction step turns
/// them into errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentIdResolveResult {
    outcome: Result<ResolvedComponentId, ResolveFailure>,
    rejected: bool,
    rejected_versions: Vec<String>,
    unmatched_versions: Vec<String>,
}

impl ComponentIdResolveResult {
    /// Successful resolution
    pub fn resolved(id: ComponentIdentifier, module_version: ModuleVersionIdentifier) -> Self {
        Self {
            outcome: Ok(ResolvedComponentId {
                id,
                module_version,
                metadata: None,
            }),
            rejected: false,
            rejected_versions: Vec::new(),
            unmatched_versions: Vec::new(),
        }
    }

    /// Successful resolution to a component with known metadata
    pub fn resolved_with_metadata(metadata: Arc<ComponentMetadata>) -> Self {
        let mut result = Self::resolved(metadata.id.clone(), metadata.module_version.clone());
        if let Ok(resolved) = &mut result.outcome {
            resolved.metadata = Some(metadata);
        }
        result
    }

    /// Failed resolution
    pub fn failed(failure: ResolveFailure) -> Self {
        Self {
            outcome: Err(failure),
            rejected: false,
            rejected_versions: Vec::new(),
            unmatched_versions: Vec::new(),
        }
    }

    /// Mark the resolved version as rejected by a constraint
    pub fn into_rejected(mut self) -> Self {
        self.rejected = true;
        self
    }

    /// Record versions rejected while resolving
    pub fn with_rejected_versions(mut self, versions: Vec<String>) -> Self {
        self.rejected_versions = versions;
        self
    }

    /// Record versions that did not match while resolving
    pub fn with_unmatched_versions(mut self, versions: Vec<String>) -> Self {
        self.unmatched_versions = versions;
        self
    }

    pub fn failure(&self) -> Option<&ResolveFailure> {
        self.outcome.as_ref().err()
    }

    pub fn resolved_id(&self) -> Option<&ResolvedComponentId> {
        self.outcome.as_ref().ok()
    }

    pub fn id(&self) -> Option<&ComponentIdentifier> {
        self.resolved_id().map(|resolved| &resolved.id)
    }

    pub fn module_version(&self) -> Option<&ModuleVersionIdentifier> {
        self.resolved_id().map(|resolved| &resolved.module_version)
    }

    pub fn metadata(&self) -> Option<&Arc<ComponentMetadata>> {
        self.resolved_id().and_then(|resolved| resolved.metadata.as_ref())
    }

    /// Resolved version, empty for failures and unconstrained selectors
    pub fn version(&self) -> &str {
        self.module_version()
            .map(|mvid| mvid.version.as_str())
            .unwrap_or_default()
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    pub fn rejected_versions(&self) -> &[String] {
        &self.rejected_versions
    }

    pub fn unmatched_versions(&self) -> &[String] {
        &self.unmatched_versions
    }
}

/// Resolves dependency selectors to component identifiers
pub trait DependencyToComponentIdResolver: Send + Sync {
    /// Resolve `dependency`, choosing among versions accepted by `accept` and
    /// skipping versions accepted by `reject`
    fn resolve(
        &self,
        dependency: &DependencyMetadata,
        accept: Option<&VersionSelector>,
        reject: Option<&VersionSelector>,
    ) -> ComponentIdResolveResult;

    /// Metadata of a known component
    fn metadata(&self, id: &ComponentIdentifier) -> Option<Arc<ComponentMetadata>>;

    /// Module a selector targets. Project selectors are mapped to the
    /// module of the project component.
    fn target_module(&self, selector: &ComponentSelector) -> Option<ModuleIdentifier> {
        selector.target_module().cloned()
    }
}

/// Repository holding every component in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    /// Components per module, ascending by version
    modules: IndexMap<ModuleIdentifier, Vec<Arc<ComponentMetadata>>>,
    /// Project components keyed by (build, path)
    projects: HashMap<(String, String), Arc<ComponentMetadata>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component. A component with the same module version replaces
    /// the existing one.
    pub fn add(&mut self, metadata: ComponentMetadata) {
        if let ComponentIdentifier::Project(project) = &metadata.id {
            self.projects.insert(
                (project.build.clone(), project.path.clone()),
                Arc::new(metadata),
            );
            return;
        }

        let versions = self
            .modules
            .entry(metadata.module_version.module.clone())
            .or_default();
        let version = Version::parse(&metadata.module_version.version);
        versions.retain(|existing| existing.module_version.version != metadata.module_version.version);
        let index = versions
            .partition_point(|existing| Version::parse(&existing.module_version.version) < version);
        versions.insert(index, Arc::new(metadata));
    }

    /// Builder-style variant of [`InMemoryRepository::add`]
    pub fn with_component(mut self, metadata: ComponentMetadata) -> Self {
        self.add(metadata);
        self
    }

    /// All versions of a module, ascending
    pub fn versions(&self, module: &ModuleIdentifier) -> Vec<String> {
        self.modules
            .get(module)
            .map(|versions| {
                versions
                    .iter()
                    .map(|m| m.module_version.version.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Modules known to this repository
    pub fn modules(&self) -> impl Iterator<Item = &ModuleIdentifier> {
        self.modules.keys()
    }

    /// Total number of module components
    pub fn component_count(&self) -> usize {
        self.modules.values().map(Vec::len).sum::<usize>() + self.projects.len()
    }

    fn resolve_project(&self, selector: &ProjectComponentSelector) -> ComponentIdResolveResult {
        match self
            .projects
            .get(&(selector.build.clone(), selector.path.clone()))
        {
            Some(metadata) => ComponentIdResolveResult::resolved_with_metadata(Arc::clone(metadata)),
            None => ComponentIdResolveResult::failed(ResolveFailure::ProjectNotFound {
                build: selector.build.clone(),
                path: selector.path.clone(),
            }),
        }
    }

    fn resolve_static(
        &self,
        dependency: &DependencyMetadata,
        selector: &ModuleComponentSelector,
        version: &str,
        reject: Option<&VersionSelector>,
    ) -> ComponentIdResolveResult {
        let found = self.modules.get(&selector.module).and_then(|versions| {
            versions
                .iter()
                .find(|metadata| metadata.module_version.version == version)
        });

        let Some(metadata) = found else {
            trace!("{} not found in repository", dependency.selector);
            return ComponentIdResolveResult::failed(ResolveFailure::NotFound {
                selector: dependency.selector.to_string(),
            });
        };

        let result = ComponentIdResolveResult::resolved_with_metadata(Arc::clone(metadata));
        if reject.is_some_and(|reject| reject.accept(version)) {
            trace!("{} rejected by constraint", metadata.module_version);
            return result
                .into_rejected()
                .with_rejected_versions(vec![version.to_string()]);
        }
        result
    }

    fn resolve_dynamic(
        &self,
        dependency: &DependencyMetadata,
        selector: &ModuleComponentSelector,
        accept: &VersionSelector,
        reject: Option<&VersionSelector>,
    ) -> ComponentIdResolveResult {
        let Some(versions) = self.modules.get(&selector.module) else {
            return ComponentIdResolveResult::failed(ResolveFailure::NotFound {
                selector: dependency.selector.to_string(),
            });
        };

        let mut rejected = Vec::new();
        let mut unmatched = Vec::new();

        for metadata in versions.iter().rev() {
            let version = metadata.module_version.version.as_str();
            let accepted = if accept.requires_metadata() {
                accept.accept_metadata(version, metadata.status)
            } else {
                accept.accept(version)
            };

            if !accepted {
                unmatched.push(version.to_string());
                continue;
            }
            if reject.is_some_and(|reject| reject.accept(version)) {
                rejected.push(version.to_string());
                continue;
            }

            trace!("{} resolved to {}", dependency.selector, metadata.module_version);
            return ComponentIdResolveResult::resolved_with_metadata(Arc::clone(metadata))
                .with_rejected_versions(rejected)
                .with_unmatched_versions(unmatched);
        }

        let failure = if rejected.is_empty() {
            ResolveFailure::NoMatchingVersion {
                selector: dependency.selector.to_string(),
                versions: unmatched.clone(),
            }
        } else {
            ResolveFailure::AllVersionsRejected {
                selector: dependency.selector.to_string(),
                versions: rejected.clone(),
            }
        };
        trace!("{}", failure);
        ComponentIdResolveResult::failed(failure)
            .with_rejected_versions(rejected)
            .with_unmatched_versions(unmatched)
    }
}

impl DependencyToComponentIdResolver for InMemoryRepository {
    fn resolve(
        &self,
        dependency: &DependencyMetadata,
        accept: Option<&VersionSelector>,
        reject: Option<&VersionSelector>,
    ) -> ComponentIdResolveResult {
        let selector = match &dependency.selector {
            ComponentSelector::Project(project) => return self.resolve_project(project),
            ComponentSelector::Module(selector) => selector,
        };

        match accept {
            None => {
                let module_version = selector.module.with_version("");
                ComponentIdResolveResult::resolved(
                    ComponentIdentifier::module(selector.module.clone(), ""),
                    module_version,
                )
            },
            Some(VersionSelector::Exact(version)) => {
                self.resolve_static(dependency, selector, version.source(), reject)
            },
            Some(accept) => self.resolve_dynamic(dependency, selector, accept, reject),
        }
    }

    fn metadata(&self, id: &ComponentIdentifier) -> Option<Arc<ComponentMetadata>> {
        match id {
            ComponentIdentifier::Module(id) => self.modules.get(&id.module).and_then(|versions| {
                versions
                    .iter()
                    .find(|metadata| metadata.module_version.version == id.version)
                    .cloned()
            }),
            ComponentIdentifier::Project(id) => self
                .projects
                .get(&(id.build.clone(), id.path.clone()))
                .cloned(),
        }
    }

    fn target_module(&self, selector: &ComponentSelector) -> Option<ModuleIdentifier> {
        match selector {
            ComponentSelector::Module(selector) => Some(selector.module.clone()),
            ComponentSelector::Project(project) => self
                .projects
                .get(&(project.build.clone(), project.path.clone()))
                .map(|metadata| metadata.module_version.module.clone()),
        }
    }
}
