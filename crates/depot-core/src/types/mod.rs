//! Core data types for dependency resolution.
//!
//! This module provides the fundamental types used throughout depot:
//! - Module and component identifiers
//! - Component selectors and declared version constraints
//! - The version model and component status

pub mod component;
pub mod dependency;
pub mod version;

// Re-export all public types
pub use component::{
    ComponentIdentifier, ComponentMetadata, ModuleComponentIdentifier, ModuleIdentifier,
    ModuleVersionIdentifier, ProjectComponentIdentifier,
};
pub use dependency::{
    ArtifactName, ComponentSelector, DependencyMetadata, ModuleComponentSelector,
    ProjectComponentSelector, VersionConstraint,
};
pub use version::{compare_versions, Status, StatusError, Version};
