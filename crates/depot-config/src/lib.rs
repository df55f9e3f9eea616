//! Configuration parsing for depot
//!
//! This crate handles the `depot.toml` manifest, the `depot.lock` lock file
//! and the layering of global, project, environment and command line
//! settings into the options used to run a resolution.

pub mod lockfile;
pub mod manifest;
pub mod merge;

// Re-export main types
pub use lockfile::LockFile;
pub use manifest::{DependencySpec, DepotToml, ProjectSection, RepositoryEntry, ResolutionSection};
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource, ProjectConfig, ResolutionSettings};

use depot_core::DepotError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, DepotError>;
