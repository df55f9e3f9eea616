//! Accumulation of selector results for one module.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use depot_core::{DepotResult, ResolveFailure, Version};

use super::{selector_accepts_candidate, ResolvableSelectorState};
use crate::component::{ComponentState, ComponentStateFactory};
use crate::repository::ComponentIdResolveResult;

/// A selector paired with its current best result. The result is replaced
/// in place when a better candidate turns up.
#[derive(Debug)]
struct Registration<'a, S> {
    selector: &'a S,
    result: Arc<ComponentIdResolveResult>,
}

/// Results of resolving the selectors of one module.
///
/// One instance serves a single pass over the selectors and is then
/// reduced with [`SelectorStateResolverResults::get_resolved`]. It is not
/// meant to be shared between threads.
#[derive(Debug)]
pub struct SelectorStateResolverResults<'a, S> {
    registrations: Vec<Registration<'a, S>>,
}

impl<'a, S: ResolvableSelectorState> SelectorStateResolverResults<'a, S> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registrations: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Record the result of a selector
    pub fn register(&mut self, selector: &'a S, result: Arc<ComponentIdResolveResult>) {
        self.registrations.push(Registration { selector, result });
    }

    /// Reuse an existing result for `selector` if one satisfies it.
    ///
    /// On a match the selector is marked resolved and registered against the
    /// same result.
    pub fn already_have_resolution_for_selector(&mut self, selector: &'a S) -> bool {
        let found = self.registrations.iter().find_map(|registration| {
            selector_accepts_candidate(
                selector,
                &registration.result,
                registration.selector.is_from_lock(),
            )
            .then(|| Arc::clone(&registration.result))
        });

        match found {
            Some(result) => {
                debug!(
                    "Reusing {} for {}",
                    result.module_version().map(ToString::to_string).unwrap_or_default(),
                    selector.selector()
                );
                selector.mark_resolved();
                self.register(selector, result);
                true
            },
            None => false,
        }
    }

    /// Replace existing results with `candidate` where it is better.
    ///
    /// A registration takes the candidate when its own result is an empty
    /// version, when both identify the same component, or when its selector
    /// accepts the candidate and the candidate's version is lower. Returns
    /// whether anything was replaced.
    pub fn replace_existing_resolutions_with_better_result(
        &mut self,
        candidate: &Arc<ComponentIdResolveResult>,
        is_from_lock: bool,
    ) -> bool {
        let mut replaced = false;
        for registration in &mut self.registrations {
            let previous = &registration.result;
            if empty_version(previous)
                || same_component(previous, candidate)
                || (selector_accepts_candidate(registration.selector, candidate, is_from_lock)
                    && lower_version(previous, candidate))
            {
                registration.result = Arc::clone(candidate);
                replaced = true;
            }
        }
        replaced
    }

    /// Reduce the registrations to the candidate components.
    ///
    /// A forced selector wins outright unless some selector is soft forced.
    /// Results shared by several registrations are counted once. If nothing
    /// resolved, the first failure is returned as the error.
    pub fn get_resolved<F: ComponentStateFactory + ?Sized>(
        &self,
        factory: &F,
    ) -> DepotResult<Vec<Arc<ComponentState>>> {
        let has_soft_force = self
            .registrations
            .iter()
            .any(|registration| registration.selector.is_soft_force());

        let mut seen = HashSet::with_capacity(self.registrations.len());
        let mut components = Vec::with_capacity(self.registrations.len());
        let mut failure: Option<&ResolveFailure> = None;

        for registration in &self.registrations {
            if registration.selector.is_force() && !has_soft_force {
                debug!("{} is forced", registration.selector.selector());
                let component = factory.component_for_id_resolve_result(&registration.result)?;
                return Ok(vec![component]);
            }

            if !seen.insert(Arc::as_ptr(&registration.result)) {
                continue;
            }
            match registration.result.failure() {
                None => {
                    components.push(factory.component_for_id_resolve_result(&registration.result)?)
                },
                Some(error) => {
                    failure.get_or_insert(error);
                },
            }
        }

        match failure {
            Some(failure) if components.is_empty() => Err(failure.clone().into()),
            _ => Ok(components),
        }
    }

    /// Check that no platform caps the component below its version.
    ///
    /// Members are checked against every owning platform; a platform
    /// component against its own state.
    pub fn is_version_allowed_by_platform(component: &ComponentState) -> bool {
        is_version_allowed_by_platform(component)
    }
}

impl<'a, S: ResolvableSelectorState> Default for SelectorStateResolverResults<'a, S> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn is_version_allowed_by_platform(component: &ComponentState) -> bool {
    let owners = component.platform_owners();
    if !owners.is_empty() {
        return !owners
            .iter()
            .any(|owner| owner.is_greater_than_forced_version(component.version()));
    }
    component
        .platform_state()
        .map_or(true, |state| !state.is_greater_than_forced_version(component.version()))
}

fn empty_version(result: &ComponentIdResolveResult) -> bool {
    result.failure().is_none() && result.version().is_empty()
}

fn same_component(previous: &ComponentIdResolveResult, candidate: &ComponentIdResolveResult) -> bool {
    match (previous.id(), candidate.id()) {
        (Some(previous), Some(candidate)) => previous == candidate,
        _ => false,
    }
}

fn lower_version(previous: &ComponentIdResolveResult, candidate: &ComponentIdResolveResult) -> bool {
    match (previous.module_version(), candidate.module_version()) {
        (Some(previous), Some(candidate)) if previous.module == candidate.module => {
            Version::parse(&candidate.version) < Version::parse(&previous.version)
        },
        _ => false,
    }
}


#[cfg(test)]
mod property_tests {
    use super::super::test_support::*;
    use super::super::SelectorState;
    use super::*;
    use crate::component::ComponentRegistry;
    use depot_core::{ComponentIdentifier, DependencyMetadata};
    use proptest::prelude::*;

    fn resolved(version: &str) -> Arc<ComponentIdResolveResult> {
        Arc::new(ComponentIdResolveResult::resolved(
            ComponentIdentifier::module(lib(), version),
            lib().with_version(version),
        ))
    }

    proptest! {
        #[test]
        fn single_hard_force_always_wins(
            versions in prop::collection::vec(1u32..20, 1..8),
            forced_index in 0usize..8,
        ) {
            let forced_index = forced_index % versions.len();
            let repo = repository(&[]);
            let selectors: Vec<SelectorState> = versions
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let dependency = DependencyMetadata::requiring(lib(), format!("{}.0", v));
                    let dependency = if i == forced_index { dependency.forced() } else { dependency };
                    selector(i as u64, dependency, &repo)
                })
                .collect();

            let mut results = SelectorStateResolverResults::new();
            for (selector, version) in selectors.iter().zip(&versions) {
                results.register(selector, resolved(&format!("{}.0", version)));
            }

            let components = results.get_resolved(&ComponentRegistry::new()).unwrap();
            prop_assert_eq!(components.len(), 1);
            let expected = format!("{}.0", versions[forced_index]);
            prop_assert_eq!(components[0].version(), expected.as_str());
        }

        #[test]
        fn resolved_components_never_include_failures(
            outcomes in prop::collection::vec(prop::option::of(1u32..20), 1..8),
        ) {
            let repo = repository(&[]);
            let selectors: Vec<SelectorState> = (0..outcomes.len())
                .map(|i| requiring(i as u64, "1.0", &repo))
                .collect();

            let mut results = SelectorStateResolverResults::new();
            for (selector, outcome) in selectors.iter().zip(&outcomes) {
                let result = match outcome {
                    Some(v) => resolved(&format!("{}.0", v)),
                    None => Arc::new(ComponentIdResolveResult::failed(ResolveFailure::NotFound {
                        selector: "org:lib:1.0".to_string(),
                    })),
                };
                results.register(selector, result);
            }

            let resolved_any = outcomes.iter().any(Option::is_some);
            match results.get_resolved(&ComponentRegistry::new()) {
                Ok(components) => {
                    prop_assert!(resolved_any);
                    prop_assert!(!components.is_empty());
                },
                Err(error) => {
                    prop_assert!(!resolved_any);
                    prop_assert!(error.is_unresolved());
                },
            }
        }
    }
}
