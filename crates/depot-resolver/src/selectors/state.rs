//! Resolution state of one dependency selector.
//!
//! A selector is created once per dependency edge and survives across
//! graph-building rounds. It memoises its require and prefer results so a
//! module is only resolved again when a new rejection invalidates the
//! previous answer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use depot_core::types::ArtifactName;
use depot_core::{
    ComponentSelector, DependencyMetadata, DepotError, DepotResult, ModuleIdentifier,
    ResolveFailure,
};

use super::{describe_versions, ResolvableSelectorState, SelectionCause, SelectionReason};
use crate::component::ComponentState;
use crate::repository::{ComponentIdResolveResult, DependencyToComponentIdResolver};
use crate::semver::{ResolvedVersionConstraint, VersionSelector};

type ResultSlot = Mutex<Option<Arc<ComponentIdResolveResult>>>;

/// Resolution state for a dependency selector.
///
/// The selector is either newly added (not resolved), failed (a failure is
/// recorded) or part of the resolution of its target module (resolved).
pub struct SelectorState {
    id: u64,
    dependency: DependencyMetadata,
    resolver: Arc<dyn DependencyToComponentIdResolver>,
    version_constraint: Option<ResolvedVersionConstraint>,
    is_project: bool,
    target: Mutex<ModuleIdentifier>,
    reasons: Mutex<Vec<SelectionReason>>,
    prefer_result: ResultSlot,
    require_result: ResultSlot,
    failure: Mutex<Option<ResolveFailure>>,
    resolved: AtomicBool,
    forced: AtomicBool,
    soft_forced: AtomicBool,
    from_lock: AtomicBool,
    changing: AtomicBool,
    reusable: AtomicBool,
    marked_reusable_already: AtomicBool,
    /// Number of outgoing edges currently using this selector
    outgoing_edge_count: AtomicUsize,
}

impl SelectorState {
    /// Create the state for a declared dependency
    pub fn new(
        id: u64,
        dependency: DependencyMetadata,
        target: ModuleIdentifier,
        resolver: Arc<dyn DependencyToComponentIdResolver>,
    ) -> DepotResult<Self> {
        let version_constraint = dependency
            .selector
            .constraint()
            .map(ResolvedVersionConstraint::new)
            .transpose()?;

        let state = Self {
            id,
            is_project: dependency.selector.is_project(),
            resolver,
            version_constraint,
            target: Mutex::new(target),
            reasons: Mutex::new(Vec::with_capacity(4)),
            prefer_result: Mutex::new(None),
            require_result: Mutex::new(None),
            failure: Mutex::new(None),
            resolved: AtomicBool::new(false),
            forced: AtomicBool::new(false),
            soft_forced: AtomicBool::new(false),
            from_lock: AtomicBool::new(false),
            changing: AtomicBool::new(false),
            reusable: AtomicBool::new(false),
            marked_reusable_already: AtomicBool::new(false),
            outgoing_edge_count: AtomicUsize::new(0),
            dependency,
        };
        state.apply(&state.dependency);
        Ok(state)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The dependency this selector was created for
    pub fn dependency(&self) -> &DependencyMetadata {
        &self.dependency
    }

    /// Module this selector currently points at
    pub fn target_module(&self) -> ModuleIdentifier {
        self.target.lock().clone()
    }

    /// Failure of the last resolution, if any
    pub fn failure(&self) -> Option<ResolveFailure> {
        self.failure.lock().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Merge another declaration of the same edge into this selector.
    ///
    /// Becoming forced or lock-pinned requires the module to be selected
    /// again. Declarations for another module are rejected.
    pub fn update(&self, dependency: &DependencyMetadata) -> DepotResult<()> {
        if dependency == &self.dependency {
            return Ok(());
        }
        if let Some(module) = dependency.selector.target_module() {
            let target = self.target.lock();
            if !self.is_project && module != &*target {
                return Err(DepotError::invalid_state(format!(
                    "selector for {} cannot be updated with a dependency on {}",
                    *target, module
                )));
            }
        }
        self.apply(dependency);
        Ok(())
    }

    fn apply(&self, dependency: &DependencyMetadata) {
        if dependency.force && !self.forced.swap(true, Ordering::AcqRel) {
            if dependency.lenient_platform {
                self.soft_forced.store(true, Ordering::Release);
            }
            self.resolved.store(false, Ordering::Release);
        }
        if dependency.from_lock && !self.from_lock.swap(true, Ordering::AcqRel) {
            self.resolved.store(false, Ordering::Release);
        }
        if dependency.changing {
            self.changing.store(true, Ordering::Release);
        }
        self.add_reasons_for(dependency);
    }

    fn add_reasons_for(&self, dependency: &DependencyMetadata) {
        let cause = if dependency.from_lock {
            SelectionCause::LockFile
        } else if dependency.force {
            SelectionCause::Forced
        } else if dependency.constraint {
            SelectionCause::Constraint
        } else {
            SelectionCause::Requested
        };
        let mut reason = SelectionReason::new(cause);
        if let Some(description) = &dependency.reason {
            reason = reason.with_description(description.clone());
        }

        let mut reasons = self.reasons.lock();
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }

    /// Count a new edge using this selector. Returns true for the first one.
    pub fn use_edge(&self) -> bool {
        self.outgoing_edge_count.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Release an edge. Returns true when the last edge is gone, at which
    /// point the selector must be resolved again before it is reused.
    pub fn release_edge(&self) -> DepotResult<bool> {
        let previous = self
            .outgoing_edge_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .map_err(|_| {
                DepotError::invalid_state(format!(
                    "outgoing edge count of selector {} cannot be negative",
                    self.dependency
                ))
            })?;
        if previous == 1 {
            self.resolved.store(false, Ordering::Release);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn outgoing_edge_count(&self) -> usize {
        self.outgoing_edge_count.load(Ordering::Acquire)
    }

    /// Mark the selector as reusable for another selection.
    ///
    /// Returns true if it had been marked before or was never resolved.
    pub fn mark_for_reuse(&self) -> bool {
        if !self.is_resolved() {
            return true;
        }
        self.reusable.store(true, Ordering::Release);
        self.marked_reusable_already.swap(true, Ordering::AcqRel)
    }

    /// Whether this selector should take part in the next selection
    pub fn can_affect_selection(&self) -> bool {
        self.reusable.load(Ordering::Acquire) || !self.is_resolved()
    }

    /// Point this selector at a component chosen elsewhere
    pub fn override_selection(&self, selected: &ComponentState) {
        self.resolved.store(true, Ordering::Release);
        self.reusable.store(false, Ordering::Release);
        *self.target.lock() = selected.module().clone();
    }

    /// Reasons declared for this selector, without result details
    pub fn selection_reasons(&self) -> Vec<SelectionReason> {
        self.reasons.lock().clone()
    }

    /// Reasons enriched with the versions rejected or not matched by the
    /// last result
    pub fn reasons_with_details(&self) -> Vec<SelectionReason> {
        let result = self
            .prefer_result
            .lock()
            .clone()
            .or_else(|| self.require_result.lock().clone());

        let rejected = result
            .as_ref()
            .map(|r| r.rejected_versions().to_vec())
            .unwrap_or_default();
        let unmatched = result
            .as_ref()
            .map(|r| r.unmatched_versions().to_vec())
            .unwrap_or_default();

        self.reasons
            .lock()
            .iter()
            .map(|reason| {
                if !matches!(
                    reason.cause,
                    SelectionCause::Requested | SelectionCause::Constraint
                ) {
                    return reason.clone();
                }
                if !rejected.is_empty() {
                    reason.clone().with_description(describe_versions("rejected", &rejected))
                } else if !unmatched.is_empty() {
                    reason
                        .clone()
                        .with_description(describe_versions("didn't match", &unmatched))
                } else {
                    reason.clone()
                }
            })
            .collect()
    }

    fn resolve_with(
        &self,
        selector: Option<&VersionSelector>,
        rejector: Option<&VersionSelector>,
        slot: &ResultSlot,
    ) -> Arc<ComponentIdResolveResult> {
        let mut previous = slot.lock();
        self.reusable.store(false, Ordering::Release);

        if let Some(previous) = previous.as_ref() {
            if !requires_resolve(previous, rejector) {
                self.resolved.store(true, Ordering::Release);
                return Arc::clone(previous);
            }
        }

        trace!("Resolving {}", self.dependency);
        let result = Arc::new(self.resolver.resolve(&self.dependency, selector, rejector));
        if let Some(failure) = result.failure() {
            *self.failure.lock() = Some(failure.clone());
        }
        *previous = Some(Arc::clone(&result));
        self.resolved.store(true, Ordering::Release);
        result
    }
}

/// A previous result is reused unless the rejections now cover its version.
/// A rejected result is reused while the rejections still cover it. Failed
/// results are never resolved again.
fn requires_resolve(previous: &ComponentIdResolveResult, all_rejects: Option<&VersionSelector>) -> bool {
    if previous.failure().is_some() {
        return false;
    }
    let covered = all_rejects.is_some_and(|rejects| rejects.accept(previous.version()));
    covered != previous.is_rejected()
}

impl ResolvableSelectorState for SelectorState {
    fn selector(&self) -> &ComponentSelector {
        &self.dependency.selector
    }

    fn version_constraint(&self) -> Option<&ResolvedVersionConstraint> {
        self.version_constraint.as_ref()
    }

    fn is_force(&self) -> bool {
        self.forced.load(Ordering::Acquire)
    }

    fn is_soft_force(&self) -> bool {
        self.soft_forced.load(Ordering::Acquire)
    }

    fn is_from_lock(&self) -> bool {
        self.from_lock.load(Ordering::Acquire)
    }

    fn has_strong_opinion(&self) -> bool {
        self.is_force()
            || self
                .version_constraint
                .as_ref()
                .is_some_and(ResolvedVersionConstraint::is_strict)
    }

    fn is_changing(&self) -> bool {
        self.changing.load(Ordering::Acquire)
    }

    fn first_dependency_artifact(&self) -> Option<&ArtifactName> {
        self.dependency.artifacts.first()
    }

    fn is_project(&self) -> bool {
        self.is_project
    }

    fn resolve(&self, all_rejects: Option<&VersionSelector>) -> Arc<ComponentIdResolveResult> {
        let required = self
            .version_constraint
            .as_ref()
            .and_then(ResolvedVersionConstraint::required_selector);
        self.resolve_with(required, all_rejects, &self.require_result)
    }

    fn resolve_prefer(
        &self,
        all_rejects: Option<&VersionSelector>,
    ) -> Option<Arc<ComponentIdResolveResult>> {
        let preferred = self
            .version_constraint
            .as_ref()
            .and_then(ResolvedVersionConstraint::preferred_selector)?;
        Some(self.resolve_with(Some(preferred), all_rejects, &self.prefer_result))
    }

    fn mark_resolved(&self) {
        self.resolved.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for SelectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorState")
            .field("id", &self.id)
            .field("dependency", &self.dependency)
            .field("resolved", &self.is_resolved())
            .field("forced", &self.is_force())
            .field("from_lock", &self.is_from_lock())
            .finish()
    }
}

impl std::fmt::Display for SelectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dependency)
    }
}
