//! Selector resolution
//!
//! Every dependency edge targeting a module contributes one selector. The
//! selectors of a module are resolved together: results found for one
//! selector are reused for the others when they satisfy them, lower
//! compatible versions replace higher ones, and forced selectors win
//! outright unless a platform softened the force.

mod reason;
mod resolver;
mod results;
mod state;

pub use reason::{SelectionCause, SelectionReason};
pub use resolver::{create_all_rejects, SelectorStateResolver};
pub use results::SelectorStateResolverResults;
pub use state::SelectorState;

pub(crate) use reason::describe_versions;
pub(crate) use results::is_version_allowed_by_platform;

use std::sync::Arc;

use depot_core::types::ArtifactName;
use depot_core::ComponentSelector;

use crate::repository::ComponentIdResolveResult;
use crate::semver::{ResolvedVersionConstraint, VersionSelector};

/// A dependency selector that can be resolved to a candidate component
pub trait ResolvableSelectorState {
    /// The raw selector as declared
    fn selector(&self) -> &ComponentSelector;

    /// Parsed version constraint, `None` for project selectors
    fn version_constraint(&self) -> Option<&ResolvedVersionConstraint>;

    fn is_force(&self) -> bool;

    /// Forced through a platform; yields to conflict resolution
    fn is_soft_force(&self) -> bool;

    fn is_from_lock(&self) -> bool;

    /// Forced or strict
    fn has_strong_opinion(&self) -> bool;

    fn is_changing(&self) -> bool;

    fn first_dependency_artifact(&self) -> Option<&ArtifactName>;

    fn is_project(&self) -> bool;

    /// Resolve the required version, skipping versions accepted by
    /// `all_rejects`. Failures are carried in the result.
    fn resolve(&self, all_rejects: Option<&VersionSelector>) -> Arc<ComponentIdResolveResult>;

    /// Resolve the preferred version, `None` without a prefer constraint
    fn resolve_prefer(
        &self,
        all_rejects: Option<&VersionSelector>,
    ) -> Option<Arc<ComponentIdResolveResult>>;

    /// Record that another selector's result already satisfies this one
    fn mark_resolved(&self);
}

/// Check whether `selector` is satisfied by `candidate` without resolving it.
///
/// Failed candidates never satisfy anything. Candidates pinned by a lock
/// file satisfy `latest` selectors unconditionally and bypass the
/// short-circuit check.
pub fn selector_accepts_candidate<S: ResolvableSelectorState + ?Sized>(
    selector: &S,
    candidate: &ComponentIdResolveResult,
    candidate_is_from_lock: bool,
) -> bool {
    if candidate.failure().is_some() {
        return false;
    }

    let Some(constraint) = selector.version_constraint() else {
        return candidate
            .id()
            .is_some_and(|id| selector.selector().matches_strictly(id));
    };

    let Some(version_selector) = constraint.required_selector() else {
        return false;
    };
    if !(candidate_is_from_lock || version_selector.can_short_circuit()) {
        return false;
    }
    if candidate_is_from_lock && version_selector.is_latest() {
        return true;
    }

    let version = candidate.version();
    !version.is_empty() && version_selector.accept(version)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Selectors and repositories shared by the selector tests

    use std::sync::Arc;

    use depot_core::{
        ComponentMetadata, DependencyMetadata, ModuleIdentifier, VersionConstraint,
    };

    use super::SelectorState;
    use crate::repository::{DependencyToComponentIdResolver, InMemoryRepository};

    pub fn lib() -> ModuleIdentifier {
        ModuleIdentifier::new("org", "lib")
    }

    pub fn repository(versions: &[&str]) -> Arc<dyn DependencyToComponentIdResolver> {
        let mut repository = InMemoryRepository::new();
        for version in versions {
            repository.add(ComponentMetadata::new(lib().with_version(*version)));
        }
        Arc::new(repository)
    }

    pub fn selector(
        id: u64,
        dependency: DependencyMetadata,
        resolver: &Arc<dyn DependencyToComponentIdResolver>,
    ) -> SelectorState {
        SelectorState::new(id, dependency, lib(), Arc::clone(resolver)).unwrap()
    }

    pub fn requiring(
        id: u64,
        version: &str,
        resolver: &Arc<dyn DependencyToComponentIdResolver>,
    ) -> SelectorState {
        selector(id, DependencyMetadata::requiring(lib(), version), resolver)
    }

    pub fn constrained(
        id: u64,
        constraint: VersionConstraint,
        resolver: &Arc<dyn DependencyToComponentIdResolver>,
    ) -> SelectorState {
        selector(id, DependencyMetadata::module(lib(), constraint), resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use depot_core::{
        ComponentIdentifier, DependencyMetadata, ModuleIdentifier, ResolveFailure,
        VersionConstraint,
    };

    fn resolved(version: &str) -> ComponentIdResolveResult {
        ComponentIdResolveResult::resolved(
            ComponentIdentifier::module(lib(), version),
            lib().with_version(version),
        )
    }

    #[test]
    fn test_failed_candidate_is_never_accepted() {
        let repo = repository(&["1.0"]);
        let selector = requiring(1, "[1.0,2.0)", &repo);
        let failed = ComponentIdResolveResult::failed(ResolveFailure::NotFound {
            selector: "org:lib:1.0".to_string(),
        });
        assert!(!selector_accepts_candidate(&selector, &failed, false));
        assert!(!selector_accepts_candidate(&selector, &failed, true));
    }

    #[test]
    fn test_range_accepts_candidate_in_range() {
        let repo = repository(&["1.0"]);
        let selector = requiring(1, "[1.0,2.0)", &repo);
        assert!(selector_accepts_candidate(&selector, &resolved("1.5"), false));
        assert!(!selector_accepts_candidate(&selector, &resolved("2.0"), false));
        assert!(!selector_accepts_candidate(&selector, &resolved(""), false));
    }

    #[test]
    fn test_latest_needs_lock() {
        let repo = repository(&["1.0"]);
        let selector = requiring(1, "latest.release", &repo);
        assert!(!selector_accepts_candidate(&selector, &resolved("1.0"), false));
        assert!(selector_accepts_candidate(&selector, &resolved("1.0"), true));
    }

    #[test]
    fn test_missing_required_selector() {
        let repo = repository(&["1.0"]);
        let selector = constrained(1, VersionConstraint::preferred("1.0"), &repo);
        assert!(!selector_accepts_candidate(&selector, &resolved("1.0"), true));
    }

    #[test]
    fn test_project_selector_matches_strictly() {
        let repo = repository(&[]);
        let dependency = DependencyMetadata::new(ComponentSelector::project(":", ":core"));
        let selector = selector(1, dependency, &repo);
        let project = ComponentIdResolveResult::resolved(
            ComponentIdentifier::project(":", ":core"),
            ModuleIdentifier::new("com.acme", "core").with_version("unspecified"),
        );
        assert!(selector.version_constraint().is_none());
        assert!(selector_accepts_candidate(&selector, &project, false));
        assert!(!selector_accepts_candidate(&selector, &resolved("1.0"), false));
    }
}
