//! Component states and the registry that creates them
//!
//! A [`ComponentState`] is one candidate version of a module as seen by the
//! resolution engine. The [`ComponentRegistry`] hands out exactly one state
//! per component and one [`VirtualPlatformState`] per platform module, so
//! rejection flags and platform ceilings are shared by every selector that
//! ends up on the same component.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use depot_core::{
    ComponentIdentifier, ComponentMetadata, DependencyMetadata, DepotError, DepotResult,
    ModuleIdentifier, ModuleVersionIdentifier,
};

use crate::platform::VirtualPlatformState;
use crate::repository::ComponentIdResolveResult;
use crate::selectors::SelectionReason;

/// One candidate component of a module
#[derive(Debug)]
pub struct ComponentState {
    id: ComponentIdentifier,
    module_version: ModuleVersionIdentifier,
    metadata: Option<Arc<ComponentMetadata>>,
    platform_owners: Vec<Arc<VirtualPlatformState>>,
    platform_state: Option<Arc<VirtualPlatformState>>,
    rejected: AtomicBool,
    reasons: Mutex<Vec<SelectionReason>>,
}

impl ComponentState {
    pub fn new(id: ComponentIdentifier, module_version: ModuleVersionIdentifier) -> Self {
        Self {
            id,
            module_version,
            metadata: None,
            platform_owners: Vec::new(),
            platform_state: None,
            rejected: AtomicBool::new(false),
            reasons: Mutex::new(Vec::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: Arc<ComponentMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Add a platform this component belongs to
    pub fn with_platform_owner(mut self, owner: Arc<VirtualPlatformState>) -> Self {
        self.platform_owners.push(owner);
        self
    }

    /// Set the platform state of a component that is itself a platform
    pub fn with_platform_state(mut self, state: Arc<VirtualPlatformState>) -> Self {
        self.platform_state = Some(state);
        self
    }

    pub fn id(&self) -> &ComponentIdentifier {
        &self.id
    }

    pub fn module_version(&self) -> &ModuleVersionIdentifier {
        &self.module_version
    }

    pub fn module(&self) -> &ModuleIdentifier {
        &self.module_version.module
    }

    pub fn version(&self) -> &str {
        &self.module_version.version
    }

    pub fn metadata(&self) -> Option<&Arc<ComponentMetadata>> {
        self.metadata.as_ref()
    }

    /// Declared dependencies, empty when no metadata is known
    pub fn dependencies(&self) -> &[DependencyMetadata] {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.dependencies.as_slice())
            .unwrap_or_default()
    }

    pub fn platform_owners(&self) -> &[Arc<VirtualPlatformState>] {
        &self.platform_owners
    }

    pub fn platform_state(&self) -> Option<&Arc<VirtualPlatformState>> {
        self.platform_state.as_ref()
    }

    pub fn is_project(&self) -> bool {
        self.id.is_project()
    }

    /// Mark this component as rejected by a constraint
    pub fn reject(&self) {
        self.rejected.store(true, Ordering::Release);
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    /// Forget a rejection from an earlier selection pass
    pub fn clear_rejection(&self) {
        self.rejected.store(false, Ordering::Release);
    }

    /// Record why this component was selected. Duplicates are ignored.
    pub fn add_selection_reason(&self, reason: SelectionReason) {
        let mut reasons = self.reasons.lock();
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }

    pub fn selection_reasons(&self) -> Vec<SelectionReason> {
        self.reasons.lock().clone()
    }

    pub fn clear_selection_reasons(&self) {
        self.reasons.lock().clear();
    }
}

/// Creates component states for resolved selectors
pub trait ComponentStateFactory {
    /// Component state for a resolve result. Fails with the result's failure
    /// if it has one.
    fn component_for_id_resolve_result(
        &self,
        result: &ComponentIdResolveResult,
    ) -> DepotResult<Arc<ComponentState>>;
}

/// Caching [`ComponentStateFactory`], safe to share between threads
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: DashMap<ComponentIdentifier, Arc<ComponentState>>,
    platforms: DashMap<ModuleIdentifier, Arc<VirtualPlatformState>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The platform state of a platform module, created on first use
    pub fn platform_state(&self, platform: &ModuleIdentifier) -> Arc<VirtualPlatformState> {
        if let Some(state) = self.platforms.get(platform) {
            return Arc::clone(&state);
        }
        let state = self
            .platforms
            .entry(platform.clone())
            .or_insert_with(|| Arc::new(VirtualPlatformState::new(platform.clone())));
        Arc::clone(&state)
    }

    /// The platform state of a module, if it is a known platform
    pub fn platform(&self, module: &ModuleIdentifier) -> Option<Arc<VirtualPlatformState>> {
        self.platforms.get(module).map(|state| Arc::clone(&state))
    }

    pub fn is_platform(&self, module: &ModuleIdentifier) -> bool {
        self.platforms.contains_key(module)
    }

    /// A previously created component state
    pub fn get(&self, id: &ComponentIdentifier) -> Option<Arc<ComponentState>> {
        self.components.get(id).map(|state| Arc::clone(&state))
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Clear the rejection flag of every component. Rejections hold for one
    /// selection pass and are marked again by the results that carry them.
    pub fn reset_rejections(&self) {
        for component in self.components.iter() {
            component.clear_rejection();
        }
    }

    fn create_component(
        &self,
        id: &ComponentIdentifier,
        module_version: &ModuleVersionIdentifier,
        metadata: Option<&Arc<ComponentMetadata>>,
    ) -> ComponentState {
        let mut state = ComponentState::new(id.clone(), module_version.clone());
        let module = &module_version.module;

        if let Some(metadata) = metadata {
            for owner in &metadata.platform_owners {
                let platform = self.platform_state(owner);
                platform.add_participating_module(module.clone());
                state = state.with_platform_owner(platform);
            }
            if metadata.virtual_platform {
                state = state.with_platform_state(self.platform_state(module));
            }
            state = state.with_metadata(Arc::clone(metadata));
        }
        if state.platform_state().is_none() {
            if let Some(platform) = self.platform(module) {
                state = state.with_platform_state(platform);
            }
        }

        debug!("Created component state for {}", id);
        state
    }
}

impl ComponentStateFactory for ComponentRegistry {
    fn component_for_id_resolve_result(
        &self,
        result: &ComponentIdResolveResult,
    ) -> DepotResult<Arc<ComponentState>> {
        let resolved = match (result.failure(), result.resolved_id()) {
            (Some(failure), _) => return Err(DepotError::Unresolved(failure.clone())),
            (None, Some(resolved)) => resolved,
            (None, None) => {
                return Err(DepotError::invalid_state(
                    "resolve result has neither a component nor a failure",
                ))
            },
        };

        let component = match self.get(&resolved.id) {
            Some(existing) => existing,
            None => {
                let created = Arc::new(self.create_component(
                    &resolved.id,
                    &resolved.module_version,
                    resolved.metadata.as_ref(),
                ));
                let entry = self.components.entry(resolved.id.clone()).or_insert(created);
                Arc::clone(&entry)
            },
        };

        if result.is_rejected() {
            component.reject();
        }
        Ok(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ResolveFailure;

    fn lib() -> ModuleIdentifier {
        ModuleIdentifier::new("org", "lib")
    }

    fn platform() -> ModuleIdentifier {
        ModuleIdentifier::new("org", "platform")
    }

    #[test]
    fn test_registry_caches_components() {
        let registry = ComponentRegistry::new();
        let metadata = Arc::new(ComponentMetadata::new(lib().with_version("1.0")));
        let result = ComponentIdResolveResult::resolved_with_metadata(metadata);

        let first = registry.component_for_id_resolve_result(&result).unwrap();
        let second = registry.component_for_id_resolve_result(&result).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.component_count(), 1);
        assert_eq!(first.version(), "1.0");
    }

    #[test]
    fn test_failure_is_surfaced() {
        let registry = ComponentRegistry::new();
        let failure = ResolveFailure::NotFound {
            selector: "org:lib:1.0".to_string(),
        };
        let result = ComponentIdResolveResult::failed(failure.clone());
        match registry.component_for_id_resolve_result(&result) {
            Err(DepotError::Unresolved(actual)) => assert_eq!(actual, failure),
            other => panic!("expected unresolved failure, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_result_marks_component() {
        let registry = ComponentRegistry::new();
        let metadata = Arc::new(ComponentMetadata::new(lib().with_version("1.0")));
        let result = ComponentIdResolveResult::resolved_with_metadata(metadata).into_rejected();
        let component = registry.component_for_id_resolve_result(&result).unwrap();
        assert!(component.is_rejected());
    }

    #[test]
    fn test_reset_rejections() {
        let registry = ComponentRegistry::new();
        let metadata = Arc::new(ComponentMetadata::new(lib().with_version("1.0")));
        let rejected = ComponentIdResolveResult::resolved_with_metadata(Arc::clone(&metadata)).into_rejected();
        let component = registry.component_for_id_resolve_result(&rejected).unwrap();
        assert!(component.is_rejected());

        registry.reset_rejections();
        assert!(!component.is_rejected());

        let plain = ComponentIdResolveResult::resolved_with_metadata(metadata);
        assert!(!registry.component_for_id_resolve_result(&plain).unwrap().is_rejected());
        registry.component_for_id_resolve_result(&rejected).unwrap();
        assert!(component.is_rejected());
    }

    #[test]
    fn test_platform_wiring() {
        let registry = ComponentRegistry::new();
        let member = Arc::new(
            ComponentMetadata::new(lib().with_version("2.0")).belongs_to(platform()),
        );
        let component = registry
            .component_for_id_resolve_result(&ComponentIdResolveResult::resolved_with_metadata(member))
            .unwrap();

        assert_eq!(component.platform_owners().len(), 1);
        let state = registry.platform(&platform()).unwrap();
        assert_eq!(state.participating_modules(), vec![lib()]);

        let platform_component = registry
            .component_for_id_resolve_result(&ComponentIdResolveResult::resolved_with_metadata(
                Arc::new(ComponentMetadata::new(platform().with_version("1.0"))),
            ))
            .unwrap();
        assert!(Arc::ptr_eq(platform_component.platform_state().unwrap(), &state));
    }

    #[test]
    fn test_selection_reasons_are_deduplicated() {
        let component = ComponentState::new(
            ComponentIdentifier::module(lib(), "1.0"),
            lib().with_version("1.0"),
        );
        let reason = SelectionReason::new(crate::selectors::SelectionCause::Requested);
        component.add_selection_reason(reason.clone());
        component.add_selection_reason(reason);
        assert_eq!(component.selection_reasons().len(), 1);
        assert!(component.dependencies().is_empty());
    }
}
