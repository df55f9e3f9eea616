//! Dependency declaration types.
//!
//! Defines component selectors, declared version constraints and the
//! metadata attached to a single dependency edge.

use super::{ComponentIdentifier, ModuleIdentifier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version constraint as declared. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionConstraint {
    #[serde(default)]
    pub required: String,
    #[serde(default)]
    pub preferred: String,
    #[serde(default)]
    pub strict: String,
    #[serde(default)]
    pub rejected: Vec<String>,
}

/// Selector for a module published to a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleComponentSelector {
    pub module: ModuleIdentifier,
    pub constraint: VersionConstraint,
}

/// Selector for a project in the current build
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectComponentSelector {
    pub build: String,
    pub path: String,
}

/// What a dependency asks for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentSelector {
    Module(ModuleComponentSelector),
    Project(ProjectComponentSelector),
}

/// Artifact explicitly requested by a dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactName {
    pub name: String,
    pub extension: String,
    pub classifier: Option<String>,
}

/// A single declared dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMetadata {
    pub selector: ComponentSelector,
    /// Forced dependencies win conflict resolution outright
    pub force: bool,
    /// Pinned by a dependency lock file
    pub from_lock: bool,
    pub changing: bool,
    /// Constraints restrict versions but do not pull the module in
    pub constraint: bool,
    /// Edge injected from a virtual platform to one of its members
    pub lenient_platform: bool,
    pub artifacts: Vec<ArtifactName>,
    pub reason: Option<String>,
}

impl VersionConstraint {
    /// Constraint requiring a version or range
    pub fn required(version: impl Into<String>) -> Self {
        Self {
            required: version.into(),
            ..Self::default()
        }
    }

    /// Constraint preferring a version without requiring it
    pub fn preferred(version: impl Into<String>) -> Self {
        Self {
            preferred: version.into(),
            ..Self::default()
        }
    }

    /// Constraint strictly limiting the acceptable versions
    pub fn strictly(version: impl Into<String>) -> Self {
        Self {
            strict: version.into(),
            ..Self::default()
        }
    }

    /// Add a preferred version
    pub fn prefer(mut self, version: impl Into<String>) -> Self {
        self.preferred = version.into();
        self
    }

    /// Add a rejected version or range
    pub fn reject(mut self, version: impl Into<String>) -> Self {
        self.rejected.push(version.into());
        self
    }

    /// The version that identifies this constraint: strict if set, else required
    pub fn version(&self) -> &str {
        if self.strict.is_empty() {
            &self.required
        } else {
            &self.strict
        }
    }

    /// Check if nothing is declared
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.preferred.is_empty()
            && self.strict.is_empty()
            && self.rejected.is_empty()
    }

    /// Check if only a required version is declared
    pub fn is_simple(&self) -> bool {
        self.preferred.is_empty() && self.strict.is_empty() && self.rejected.is_empty()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_simple() {
            return f.write_str(&self.required);
        }
        let mut parts = Vec::new();
        if !self.strict.is_empty() {
            parts.push(format!("strictly {}", self.strict));
        } else if !self.required.is_empty() {
            parts.push(format!("require {}", self.required));
        }
        if !self.preferred.is_empty() {
            parts.push(format!("prefer {}", self.preferred));
        }
        if !self.rejected.is_empty() {
            parts.push(format!("reject {}", self.rejected.join(" & ")));
        }
        write!(f, "{{{}}}", parts.join("; "))
    }
}

impl ComponentSelector {
    /// Selector for a module with the given constraint
    pub fn module(module: ModuleIdentifier, constraint: VersionConstraint) -> Self {
        ComponentSelector::Module(ModuleComponentSelector { module, constraint })
    }

    /// Selector for a project
    pub fn project(build: impl Into<String>, path: impl Into<String>) -> Self {
        ComponentSelector::Project(ProjectComponentSelector {
            build: build.into(),
            path: path.into(),
        })
    }

    /// Target module, `None` for project selectors
    pub fn target_module(&self) -> Option<&ModuleIdentifier> {
        match self {
            ComponentSelector::Module(selector) => Some(&selector.module),
            ComponentSelector::Project(_) => None,
        }
    }

    /// Declared constraint, `None` for project selectors
    pub fn constraint(&self) -> Option<&VersionConstraint> {
        match self {
            ComponentSelector::Module(selector) => Some(&selector.constraint),
            ComponentSelector::Project(_) => None,
        }
    }

    /// Check if this is a project selector
    pub fn is_project(&self) -> bool {
        matches!(self, ComponentSelector::Project(_))
    }

    /// Exact match: same module and the declared version is exactly the
    /// component version, or same project.
    pub fn matches_strictly(&self, id: &ComponentIdentifier) -> bool {
        match (self, id) {
            (ComponentSelector::Module(selector), ComponentIdentifier::Module(id)) => {
                selector.module == id.module && selector.constraint.version() == id.version
            },
            (ComponentSelector::Project(selector), ComponentIdentifier::Project(id)) => {
                selector.build == id.build && selector.path == id.path
            },
            _ => false,
        }
    }
}

impl fmt::Display for ComponentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentSelector::Module(selector) if selector.constraint.is_empty() => {
                write!(f, "{}", selector.module)
            },
            ComponentSelector::Module(selector) => {
                write!(f, "{}:{}", selector.module, selector.constraint)
            },
            ComponentSelector::Project(selector) if selector.build == ":" => {
                write!(f, "project {}", selector.path)
            },
            ComponentSelector::Project(selector) => {
                write!(f, "project {}{}", selector.build, selector.path)
            },
        }
    }
}

impl ArtifactName {
    /// Create an artifact name with the given extension
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            classifier: None,
        }
    }

    /// Add a classifier
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }
}

impl DependencyMetadata {
    /// Create a plain dependency on the given selector
    pub fn new(selector: ComponentSelector) -> Self {
        Self {
            selector,
            force: false,
            from_lock: false,
            changing: false,
            constraint: false,
            lenient_platform: false,
            artifacts: Vec::new(),
            reason: None,
        }
    }

    /// Dependency on a module with a constraint
    pub fn module(module: ModuleIdentifier, constraint: VersionConstraint) -> Self {
        Self::new(ComponentSelector::module(module, constraint))
    }

    /// Dependency on a module requiring the given version
    pub fn requiring(module: ModuleIdentifier, version: impl Into<String>) -> Self {
        Self::module(module, VersionConstraint::required(version))
    }

    /// Make this dependency forced
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Mark this dependency as coming from a lock file
    pub fn locked(mut self) -> Self {
        self.from_lock = true;
        self
    }

    /// Mark this dependency as changing
    pub fn changing(mut self) -> Self {
        self.changing = true;
        self
    }

    /// Turn this dependency into a constraint
    pub fn as_constraint(mut self) -> Self {
        self.constraint = true;
        self
    }

    /// Mark this dependency as a platform-to-member edge
    pub fn lenient_platform(mut self) -> Self {
        self.lenient_platform = true;
        self
    }

    /// Request a specific artifact
    pub fn with_artifact(mut self, artifact: ArtifactName) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Attach a human readable reason
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Target module, `None` for project dependencies
    pub fn target_module(&self) -> Option<&ModuleIdentifier> {
        self.selector.target_module()
    }
}

impl fmt::Display for DependencyMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        if self.force {
            f.write_str(" (forced)")?;
        }
        if self.from_lock {
            f.write_str(" (locked)")?;
        }
        Ok(())
    }
}
