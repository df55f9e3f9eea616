//! Why a component was selected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cause of a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionCause {
    Root,
    Requested,
    Forced,
    Constraint,
    LockFile,
    Rejection,
    ConflictResolution,
}

/// A selection cause with an optional description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionReason {
    pub cause: SelectionCause,
    pub description: Option<String>,
}

impl SelectionCause {
    /// Default description of the cause
    pub fn default_description(&self) -> &'static str {
        match self {
            SelectionCause::Root => "root",
            SelectionCause::Requested => "requested",
            SelectionCause::Forced => "forced",
            SelectionCause::Constraint => "constraint",
            SelectionCause::LockFile => "dependency lock file",
            SelectionCause::Rejection => "rejection",
            SelectionCause::ConflictResolution => "conflict resolution",
        }
    }
}

impl SelectionReason {
    pub fn new(cause: SelectionCause) -> Self {
        Self {
            cause,
            description: None,
        }
    }

    /// Attach a custom description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The custom description, or the default one of the cause
    pub fn describe(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or_else(|| self.cause.default_description())
    }
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// "rejected version 1.1" / "rejected versions 1.1, 1.2"
pub(crate) fn describe_versions(prefix: &str, versions: &[String]) -> String {
    let plural = if versions.len() > 1 { "s" } else { "" };
    format!("{} version{} {}", prefix, plural, versions.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(SelectionReason::new(SelectionCause::LockFile).to_string(), "dependency lock file");
        let reason = SelectionReason::new(SelectionCause::Requested).with_description("security fix");
        assert_eq!(reason.describe(), "security fix");
    }

    #[test]
    fn test_describe_versions() {
        assert_eq!(describe_versions("rejected", &["1.1".to_string()]), "rejected version 1.1");
        assert_eq!(
            describe_versions("didn't match", &["2.0".to_string(), "3.0".to_string()]),
            "didn't match versions 2.0, 3.0"
        );
    }
}
