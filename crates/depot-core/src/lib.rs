//! # depot-core
//!
//! Core types shared across all depot crates.
//!
//! This crate provides:
//! - Module, component and project identifiers
//! - Component selectors, declared version constraints and dependency metadata
//! - The version model used to order candidate versions
//! - DepotError and ResolveFailure for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (identifiers, selectors, versions, metadata)
//! - `error`: Error types and result aliases

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{DepotError, DepotResult, ResolveFailure};
pub use types::{
    ComponentIdentifier, ComponentMetadata, ComponentSelector, DependencyMetadata,
    ModuleIdentifier, ModuleVersionIdentifier, Status, Version, VersionConstraint,
};
