//! Dependency selector resolution engine for depot
//!
//! This crate resolves the selectors targeting each module of a dependency
//! graph to a single component, honouring version constraints, rejections,
//! forced versions, lock file pins and virtual platform ceilings, and builds
//! the resolved graph with cycle detection and parallel per-module selection.

pub mod component;
pub mod conflict;
pub mod graph;
pub mod platform;
pub mod repository;
pub mod selectors;
pub mod semver;

// Re-export main types
pub use component::{ComponentRegistry, ComponentState, ComponentStateFactory};
pub use conflict::{ConflictResolution, ConflictResolver};
pub use graph::{
    resolve_modules_parallel, ComponentNode, DependencyEdge, DependencyGraphBuilder, Resolution,
    ResolvedGraph, DEFAULT_MAX_ITERATIONS,
};
pub use platform::VirtualPlatformState;
pub use repository::{ComponentIdResolveResult, DependencyToComponentIdResolver, InMemoryRepository};
pub use selectors::{
    selector_accepts_candidate, ResolvableSelectorState, SelectionCause, SelectionReason,
    SelectorState, SelectorStateResolver, SelectorStateResolverResults,
};
pub use semver::{ResolvedVersionConstraint, VersionSelector};

