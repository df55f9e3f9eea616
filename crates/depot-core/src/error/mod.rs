//! Error types and result aliases for depot operations.
//!
//! Resolution failures are plain values ([`ResolveFailure`]) carried inside
//! candidate results; everything else is a [`DepotError`].

use thiserror::Error;

/// Why a single selector could not be resolved to a component.
///
/// Failures are cloned freely: the same failure may be recorded by several
/// registrations and rethrown once extraction finds nothing usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    #[error("Could not find {selector}.")]
    NotFound { selector: String },

    #[error(
        "Could not find any version that matches {selector}. Versions that do not match: {}",
        .versions.join(", ")
    )]
    NoMatchingVersion {
        selector: String,
        versions: Vec<String>,
    },

    #[error(
        "Could not find any version that matches {selector}. Versions rejected by constraints: {}",
        .versions.join(", ")
    )]
    AllVersionsRejected {
        selector: String,
        versions: Vec<String>,
    },

    #[error("Project '{path}' not found in build '{build}'.")]
    ProjectNotFound { build: String, path: String },

    #[error("Could not resolve {selector}: {message}")]
    DependencyFailed { selector: String, message: String },
}

impl ResolveFailure {
    /// Display name of the selector that failed
    pub fn selector(&self) -> String {
        match self {
            ResolveFailure::NotFound { selector }
            | ResolveFailure::NoMatchingVersion { selector, .. }
            | ResolveFailure::AllVersionsRejected { selector, .. }
            | ResolveFailure::DependencyFailed { selector, .. } => selector.clone(),
            ResolveFailure::ProjectNotFound { build, path } => format!("project '{}{}'", build, path),
        }
    }
}

/// Unified error type for all depot operations
#[derive(Error, Debug)]
pub enum DepotError {
    // Resolution errors
    #[error(transparent)]
    Unresolved(#[from] ResolveFailure),

    #[error("Invalid version selector '{selector}': {reason}")]
    InvalidVersionSelector { selector: String, reason: String },

    #[error("Version '{selector}' cannot be converted to a strict version constraint")]
    UnsupportedStrictVersion { selector: String },

    #[error("Invalid module coordinates '{input}': expected 'group:name'")]
    InvalidCoordinates { input: String },

    #[error("Inconsistent resolution state: {message}")]
    InvalidState { message: String },

    #[error("Conflict found for module '{module}': {}", .versions.join(" and "))]
    VersionConflict {
        module: String,
        versions: Vec<String>,
    },

    #[error("All candidates for module '{module}' were rejected: {}", .versions.join(", "))]
    AllCandidatesRejected {
        module: String,
        versions: Vec<String>,
    },

    #[error("Selection of module '{module}' did not stabilise after {iterations} iterations")]
    UnstableGraph { module: String, iterations: usize },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    // Config errors
    #[error("Failed to parse {file}: {message} at line {line}, column {column}")]
    TomlParse {
        file: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("Invalid lock file entry at line {line}: {reason}")]
    LockFile { line: usize, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for depot operations
pub type DepotResult<T> = Result<T, DepotError>;

impl DepotError {
    /// Create an IO error from std::io::Error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a config validation error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Check if this error is a plain resolution failure
    pub fn is_unresolved(&self) -> bool {
        matches!(self, DepotError::Unresolved(_))
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DepotError::Unresolved(ResolveFailure::NoMatchingVersion { .. }) => {
                Some("Widen the version range or add the missing version to the repository")
            },
            DepotError::Unresolved(ResolveFailure::AllVersionsRejected { .. }) => {
                Some("Relax the 'reject' or 'strictly' constraints on this module")
            },
            DepotError::Unresolved(_) => Some("Check the module coordinates and repository contents"),
            DepotError::UnsupportedStrictVersion { .. } => {
                Some("Use an exact version or a range with an upper bound for 'strictly'")
            },
            DepotError::VersionConflict { .. } => {
                Some("Declare a single version, or switch conflict-resolution to 'latest'")
            },
            DepotError::UnstableGraph { .. } => {
                Some("Add a version constraint for the module to stabilise selection")
            },
            DepotError::LockFile { .. } => Some("Regenerate the lock file with 'depot lock'"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let failure = ResolveFailure::NoMatchingVersion {
            selector: "org.foo:bar:[1.0,2.0)".to_string(),
            versions: vec!["2.1".to_string(), "0.9".to_string()],
        };
        assert_eq!(
            failure.to_string(),
            "Could not find any version that matches org.foo:bar:[1.0,2.0). Versions that do not match: 2.1, 0.9"
        );
        assert_eq!(failure.selector(), "org.foo:bar:[1.0,2.0)");
    }

    #[test]
    fn test_unresolved_is_transparent() {
        let failure = ResolveFailure::NotFound {
            selector: "org.foo:bar:1.0".to_string(),
        };
        let error = DepotError::from(failure.clone());
        assert!(error.is_unresolved());
        assert_eq!(error.to_string(), failure.to_string());
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_conflict_message() {
        let error = DepotError::VersionConflict {
            module: "org.foo:bar".to_string(),
            versions: vec!["1.0".to_string(), "2.0".to_string()],
        };
        assert_eq!(error.to_string(), "Conflict found for module 'org.foo:bar': 1.0 and 2.0");
    }
}
