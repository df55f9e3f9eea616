//! Module and component identifiers, and the metadata a repository serves
//! for a component.

use super::{DependencyMetadata, Status};
use crate::error::DepotError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Module coordinates without a version (`group:name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentifier {
    pub group: String,
    pub name: String,
}

/// Module coordinates with a version (`group:name:version`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleVersionIdentifier {
    pub module: ModuleIdentifier,
    pub version: String,
}

/// Identifier of a component published to a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleComponentIdentifier {
    pub module: ModuleIdentifier,
    pub version: String,
}

/// Identifier of a project built alongside the root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectComponentIdentifier {
    pub build: String,
    pub path: String,
}

/// Identifier of a resolved component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentIdentifier {
    Module(ModuleComponentIdentifier),
    Project(ProjectComponentIdentifier),
}

/// Metadata for a single component as served by a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub id: ComponentIdentifier,
    pub module_version: ModuleVersionIdentifier,
    pub status: Status,
    pub dependencies: Vec<DependencyMetadata>,
    /// Virtual platforms this component belongs to
    pub platform_owners: Vec<ModuleIdentifier>,
    /// Whether this component is itself a virtual platform
    #[serde(default)]
    pub virtual_platform: bool,
}

impl ModuleIdentifier {
    /// Create a new module identifier
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse `group:name` coordinates
    pub fn parse(coordinates: &str) -> Result<Self, DepotError> {
        match coordinates.trim().split_once(':') {
            Some((group, name))
                if !group.is_empty() && !name.is_empty() && !name.contains(':') =>
            {
                Ok(Self::new(group, name))
            },
            _ => Err(DepotError::InvalidCoordinates {
                input: coordinates.to_string(),
            }),
        }
    }

    /// Attach a version to this module
    pub fn with_version(&self, version: impl Into<String>) -> ModuleVersionIdentifier {
        ModuleVersionIdentifier {
            module: self.clone(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl ModuleVersionIdentifier {
    /// Create a new module version identifier
    pub fn new(module: ModuleIdentifier, version: impl Into<String>) -> Self {
        Self {
            module,
            version: version.into(),
        }
    }
}

impl fmt::Display for ModuleVersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

impl ComponentIdentifier {
    /// Create a module component identifier
    pub fn module(module: ModuleIdentifier, version: impl Into<String>) -> Self {
        ComponentIdentifier::Module(ModuleComponentIdentifier {
            module,
            version: version.into(),
        })
    }

    /// Create a project component identifier
    pub fn project(build: impl Into<String>, path: impl Into<String>) -> Self {
        ComponentIdentifier::Project(ProjectComponentIdentifier {
            build: build.into(),
            path: path.into(),
        })
    }

    /// Check if this identifies a project component
    pub fn is_project(&self) -> bool {
        matches!(self, ComponentIdentifier::Project(_))
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentIdentifier::Module(id) => write!(f, "{}:{}", id.module, id.version),
            ComponentIdentifier::Project(id) if id.build == ":" => write!(f, "project {}", id.path),
            ComponentIdentifier::Project(id) => write!(f, "project {}{}", id.build, id.path),
        }
    }
}

impl ComponentMetadata {
    /// Create metadata for a module component with no dependencies
    pub fn new(module_version: ModuleVersionIdentifier) -> Self {
        let id = ComponentIdentifier::module(
            module_version.module.clone(),
            module_version.version.clone(),
        );
        Self {
            id,
            module_version,
            status: Status::default(),
            dependencies: Vec::new(),
            platform_owners: Vec::new(),
            virtual_platform: false,
        }
    }

    /// Create metadata for a project component
    pub fn project(
        build: impl Into<String>,
        path: impl Into<String>,
        module_version: ModuleVersionIdentifier,
    ) -> Self {
        Self {
            id: ComponentIdentifier::project(build, path),
            module_version,
            status: Status::Integration,
            dependencies: Vec::new(),
            platform_owners: Vec::new(),
            virtual_platform: false,
        }
    }

    /// Set the component status
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Add a dependency
    pub fn with_dependency(mut self, dependency: DependencyMetadata) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Declare that this component belongs to a virtual platform
    pub fn belongs_to(mut self, platform: ModuleIdentifier) -> Self {
        self.platform_owners.push(platform);
        self
    }

    /// Declare that this component is a virtual platform
    pub fn as_virtual_platform(mut self) -> Self {
        self.virtual_platform = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates() {
        let module = ModuleIdentifier::parse("org.foo:bar").unwrap();
        assert_eq!(module.group, "org.foo");
        assert_eq!(module.name, "bar");
        assert_eq!(module.to_string(), "org.foo:bar");

        assert!(ModuleIdentifier::parse("bar").is_err());
        assert!(ModuleIdentifier::parse(":bar").is_err());
        assert!(ModuleIdentifier::parse("org:bar:1.0").is_err());
    }

    #[test]
    fn test_identifier_display() {
        let module = ModuleIdentifier::new("org", "lib");
        assert_eq!(module.with_version("1.0").to_string(), "org:lib:1.0");
        assert_eq!(ComponentIdentifier::module(module, "2.0").to_string(), "org:lib:2.0");
        assert_eq!(ComponentIdentifier::project(":", ":app").to_string(), "project :app");
        assert!(ComponentIdentifier::project(":", ":app").is_project());
    }

    #[test]
    fn test_metadata_builder() {
        let platform = ModuleIdentifier::new("org", "platform");
        let metadata = ComponentMetadata::new(ModuleIdentifier::new("org", "lib").with_version("1.0"))
            .with_status(Status::Milestone)
            .belongs_to(platform.clone());

        assert_eq!(metadata.status, Status::Milestone);
        assert_eq!(metadata.platform_owners, vec![platform]);
        assert!(metadata.dependencies.is_empty());
    }
}
