//! Selection of the best component for the selectors of one module.

use std::sync::Arc;

use tracing::debug;

use depot_core::{DepotError, DepotResult, ModuleIdentifier, ResolveFailure, Version};

use super::results::is_version_allowed_by_platform;
use super::{ResolvableSelectorState, SelectorStateResolverResults};
use crate::component::{ComponentRegistry, ComponentState, ComponentStateFactory};
use crate::conflict::ConflictResolver;
use crate::repository::ComponentIdResolveResult;
use crate::semver::{ResolvedVersionConstraint, VersionSelector};

/// Resolves every selector of a module and picks one component
#[derive(Debug)]
pub struct SelectorStateResolver<F = ComponentRegistry> {
    conflict_resolver: ConflictResolver,
    factory: Arc<F>,
}

impl<F: ComponentStateFactory> SelectorStateResolver<F> {
    pub fn new(conflict_resolver: ConflictResolver, factory: Arc<F>) -> Self {
        Self {
            conflict_resolver,
            factory,
        }
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    pub fn conflict_resolver(&self) -> &ConflictResolver {
        &self.conflict_resolver
    }

    /// Select the component for `module` given all of its selectors.
    ///
    /// A single remaining candidate is selected directly; several go
    /// through conflict resolution. A rejected candidate is never selected,
    /// and neither is the empty version left by an unresolved prefer.
    pub fn select_best<S: ResolvableSelectorState>(
        &self,
        module: &ModuleIdentifier,
        selectors: &[&S],
    ) -> DepotResult<Arc<ComponentState>> {
        if selectors.is_empty() {
            return Err(DepotError::invalid_state(format!(
                "no selectors to resolve for {}",
                module
            )));
        }

        let all_rejects = create_all_rejects(selectors);
        let candidates = self.resolve_selectors(selectors, all_rejects.as_ref())?;

        let selected = match candidates.as_slice() {
            [] => {
                return Err(DepotError::invalid_state(format!(
                    "selectors for {} produced no candidate",
                    module
                )))
            },
            [single] if single.is_rejected() => {
                return Err(DepotError::AllCandidatesRejected {
                    module: module.to_string(),
                    versions: vec![single.version().to_string()],
                })
            },
            [single] => {
                debug!("Selected {} for {}", single.module_version(), module);
                Arc::clone(single)
            },
            _ => self.conflict_resolver.select(module, &candidates)?,
        };

        if selected.version().is_empty() && !selected.is_project() {
            return Err(missing_version_failure(selectors, all_rejects.as_ref()).into());
        }
        Ok(selected)
    }

    fn resolve_selectors<S: ResolvableSelectorState>(
        &self,
        selectors: &[&S],
        all_rejects: Option<&VersionSelector>,
    ) -> DepotResult<Vec<Arc<ComponentState>>> {
        if let [selector] = selectors {
            let has_prefer = selector
                .version_constraint()
                .and_then(ResolvedVersionConstraint::preferred_selector)
                .is_some();
            if !has_prefer {
                let result = selector.resolve(all_rejects);
                return Ok(vec![self.factory.component_for_id_resolve_result(&result)?]);
            }
        }

        let mut results = SelectorStateResolverResults::with_capacity(selectors.len());
        self.build_resolve_results(selectors, all_rejects, &mut results)?;
        results.get_resolved(self.factory.as_ref())
    }

    fn build_resolve_results<'a, S: ResolvableSelectorState>(
        &self,
        selectors: &[&'a S],
        all_rejects: Option<&VersionSelector>,
        results: &mut SelectorStateResolverResults<'a, S>,
    ) -> DepotResult<()> {
        let mut prefer_results: Vec<Arc<ComponentIdResolveResult>> = Vec::new();

        for &selector in selectors {
            if !results.already_have_resolution_for_selector(selector) {
                let result = selector.resolve(all_rejects);
                results.replace_existing_resolutions_with_better_result(&result, selector.is_from_lock());
                results.register(selector, result);
            }

            if let Some(preferred) = selector.resolve_prefer(all_rejects) {
                if preferred.failure().is_none() && !preferred.is_rejected() {
                    prefer_results.push(preferred);
                }
            }
        }

        prefer_results.sort_by(|a, b| Version::parse(b.version()).cmp(&Version::parse(a.version())));
        for preferred in &prefer_results {
            let component = self.factory.component_for_id_resolve_result(preferred)?;
            if is_version_allowed_by_platform(&component)
                && results.replace_existing_resolutions_with_better_result(preferred, false)
            {
                debug!("Preferred version {} applied", component.module_version());
                break;
            }
        }
        Ok(())
    }
}

/// Failure for a module whose selection never got past the empty version:
/// the failed prefer lookup if there is one
fn missing_version_failure<S: ResolvableSelectorState>(
    selectors: &[&S],
    all_rejects: Option<&VersionSelector>,
) -> ResolveFailure {
    selectors
        .iter()
        .filter_map(|selector| selector.resolve_prefer(all_rejects))
        .find_map(|preferred| preferred.failure().cloned())
        .unwrap_or_else(|| ResolveFailure::NoMatchingVersion {
            selector: selectors
                .first()
                .map(|selector| selector.selector().to_string())
                .unwrap_or_default(),
            versions: Vec::new(),
        })
}

/// Union of the rejections declared by every selector
pub fn create_all_rejects<S: ResolvableSelectorState>(selectors: &[&S]) -> Option<VersionSelector> {
    let rejects = selectors
        .iter()
        .filter_map(|selector| selector.version_constraint())
        .filter_map(ResolvedVersionConstraint::rejected_selector)
        .cloned()
        .collect();
    VersionSelector::union(rejects)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::SelectorState;
    use super::*;
    use crate::conflict::ConflictResolution;
    use crate::platform::VirtualPlatformState;
    use crate::repository::{DependencyToComponentIdResolver, InMemoryRepository};
    use depot_core::{ComponentMetadata, DependencyMetadata, VersionConstraint};

    fn resolver() -> SelectorStateResolver {
        SelectorStateResolver::new(ConflictResolver::default(), Arc::new(ComponentRegistry::new()))
    }

    fn select(selectors: &[&SelectorState]) -> DepotResult<Arc<ComponentState>> {
        resolver().select_best(&lib(), selectors)
    }

    #[test]
    fn test_single_selector() {
        let repo = repository(&["1.0", "1.5", "1.9"]);
        let a = requiring(1, "[1.0,2.0)", &repo);
        assert_eq!(select(&[&a]).unwrap().version(), "1.9");
    }

    #[test]
    fn test_single_selector_failure() {
        let repo = repository(&["1.0"]);
        let a = requiring(1, "3.0", &repo);
        let error = select(&[&a]).unwrap_err();
        assert!(error.is_unresolved());
    }

    #[test]
    fn test_range_and_exact_agree_on_lower_version() {
        let repo = repository(&["1.0", "1.5", "1.9"]);
        let a = requiring(1, "[1.0,2.0)", &repo);
        let b = requiring(2, "1.5", &repo);
        assert_eq!(select(&[&a, &b]).unwrap().version(), "1.5");
    }

    #[test]
    fn test_forced_selector_beats_higher_request() {
        let repo = repository(&["2.0", "3.0"]);
        let a = selector(1, DependencyMetadata::requiring(lib(), "2.0").forced(), &repo);
        let b = requiring(2, "3.0", &repo);
        assert_eq!(select(&[&a, &b]).unwrap().version(), "2.0");
    }

    #[test]
    fn test_conflicting_requests_pick_latest() {
        let repo = repository(&["1.0", "2.0"]);
        let a = requiring(1, "1.0", &repo);
        let b = requiring(2, "2.0", &repo);
        assert_eq!(select(&[&a, &b]).unwrap().version(), "2.0");

        let strict = SelectorStateResolver::new(
            ConflictResolver::new(ConflictResolution::Strict),
            Arc::new(ComponentRegistry::new()),
        );
        let c = requiring(3, "1.0", &repo);
        let d = requiring(4, "2.0", &repo);
        assert!(matches!(
            strict.select_best(&lib(), &[&c, &d]),
            Err(DepotError::VersionConflict { .. })
        ));
    }

    #[test]
    fn test_rejection_applies_to_every_selector() {
        let repo = repository(&["1.0", "1.5", "1.9"]);
        let a = requiring(1, "[1.0,2.0)", &repo);
        let b = constrained(2, VersionConstraint::required("1.+").reject("1.9"), &repo);
        assert_eq!(select(&[&a, &b]).unwrap().version(), "1.5");
    }

    #[test]
    fn test_prefer_lowers_range() {
        let repo = repository(&["1.0", "1.5", "1.9"]);
        let a = constrained(1, VersionConstraint::required("[1.0,2.0)").prefer("1.5"), &repo);
        assert_eq!(select(&[&a]).unwrap().version(), "1.5");
    }

    #[test]
    fn test_prefer_only_selector_fills_empty_version() {
        let repo = repository(&["1.0", "1.5"]);
        let a = constrained(1, VersionConstraint::preferred("1.0"), &repo);
        assert_eq!(select(&[&a]).unwrap().version(), "1.0");
    }

    #[test]
    fn test_missing_prefer_is_not_selected() {
        let repo = repository(&["1.0"]);
        let a = constrained(1, VersionConstraint::preferred("9.0"), &repo);
        match select(&[&a]) {
            Err(DepotError::Unresolved(ResolveFailure::NotFound { selector })) => {
                assert!(selector.starts_with("org:lib"))
            },
            other => panic!("expected unresolved prefer, got {:?}", other),
        }
    }

    #[test]
    fn test_single_rejected_candidate_fails() {
        let repo = repository(&["1.0", "1.5"]);
        let a = constrained(1, VersionConstraint::required("1.0").reject("1.0"), &repo);
        match select(&[&a]) {
            Err(DepotError::AllCandidatesRejected { module, versions }) => {
                assert_eq!(module, "org:lib");
                assert_eq!(versions, vec!["1.0"]);
            },
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_prefer_outside_range_is_ignored() {
        let repo = repository(&["1.0", "1.5", "3.0"]);
        let a = constrained(1, VersionConstraint::required("[1.0,2.0)").prefer("3.0"), &repo);
        assert_eq!(select(&[&a]).unwrap().version(), "1.5");
    }

    #[test]
    fn test_prefer_disallowed_by_platform_is_skipped() {
        let registry = Arc::new(ComponentRegistry::new());
        let platform = ModuleIdentifier::new("org", "bom");
        registry.platform_state(&platform).force_version("1.0");

        let mut repository = InMemoryRepository::new();
        for version in ["1.0", "1.5", "1.9"] {
            repository.add(ComponentMetadata::new(lib().with_version(version)).belongs_to(platform.clone()));
        }
        let repo: Arc<dyn DependencyToComponentIdResolver> = Arc::new(repository);

        let a = constrained(1, VersionConstraint::required("[1.0,2.0)").prefer("1.5"), &repo);
        let resolver = SelectorStateResolver::new(ConflictResolver::default(), Arc::clone(&registry));
        let selected = resolver.select_best(&lib(), &[&a]).unwrap();
        assert_eq!(selected.version(), "1.9");
        assert!(registry.platform(&platform).is_some_and(|state: Arc<VirtualPlatformState>| {
            state.is_participating(&lib())
        }));
    }

    #[test]
    fn test_all_failures_surface_first() {
        let repo = repository(&["1.0"]);
        let a = requiring(1, "5.0", &repo);
        let b = requiring(2, "6.0", &repo);
        match select(&[&a, &b]) {
            Err(DepotError::Unresolved(failure)) => assert_eq!(failure.selector(), "org:lib:5.0"),
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_create_all_rejects() {
        let repo = repository(&[]);
        let a = constrained(1, VersionConstraint::required("1.0").reject("1.1"), &repo);
        let b = constrained(2, VersionConstraint::strictly("[1.0,2.0)"), &repo);
        let c = requiring(3, "1.0", &repo);

        let rejects = create_all_rejects(&[&a, &b, &c]).unwrap();
        assert!(rejects.accept("1.1"));
        assert!(rejects.accept("2.0"));
        assert!(!rejects.accept("1.5"));
        assert!(create_all_rejects(&[&c]).is_none());
    }

    #[test]
    fn test_no_selectors() {
        let empty: [&SelectorState; 0] = [];
        assert!(select(&empty).is_err());
    }
}
