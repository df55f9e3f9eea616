//! depot.toml manifest parsing
//!
//! The manifest declares the root project, its dependencies, the resolution
//! options and the contents of the in-memory repository the resolution runs
//! against.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use depot_core::{
    ComponentMetadata, ComponentSelector, DependencyMetadata, DepotError, ModuleIdentifier,
    Status, VersionConstraint,
};
use depot_resolver::{ConflictResolution, InMemoryRepository, ResolvedVersionConstraint};

use crate::ConfigResult;

/// Build name of the root project and every project entry
pub const ROOT_BUILD: &str = ":";

/// Complete depot.toml configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotToml {
    /// Root project coordinates
    pub project: ProjectSection,

    /// Resolution options
    #[serde(default)]
    pub resolution: ResolutionSection,

    /// Dependencies of the root project
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    /// Components available to the resolution
    #[serde(default)]
    pub repository: Vec<RepositoryEntry>,
}

/// Root project coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    pub group: String,
    pub name: String,
    #[serde(default = "default_project_version")]
    pub version: String,
}

/// Resolution options. Unset fields fall through to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolutionSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_resolution: Option<ConflictResolution>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,

    /// Lock file path, relative to the manifest directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<Utf8PathBuf>,
}

/// A declared dependency, on either a module or a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependencySpec {
    /// Module coordinates (`group:name`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// Project path (`:lib`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Required version or range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strictly: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reject: Vec<String>,

    #[serde(default)]
    pub force: bool,

    /// Only constrains the version, does not pull the module in
    #[serde(default)]
    pub constraint: bool,

    #[serde(default)]
    pub changing: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub because: Option<String>,
}

/// A component served by the in-memory repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryEntry {
    /// Module coordinates (`group:name`)
    pub module: String,

    pub version: String,

    #[serde(default)]
    pub status: Status,

    /// Virtual platforms this component belongs to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub belongs_to: Vec<String>,

    #[serde(default)]
    pub virtual_platform: bool,

    /// Registers the entry as a project component with this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencySpec>,
}

fn default_project_version() -> String {
    "unspecified".to_string()
}

impl DepotToml {
    /// Coordinates of the root project
    pub fn project_module(&self) -> ConfigResult<ModuleIdentifier> {
        parse_module(&format!("{}:{}", self.project.group, self.project.name), "project")
    }

    /// Metadata of the root project with its declared dependencies
    pub fn root_component(&self) -> ConfigResult<ComponentMetadata> {
        let module = self.project_module()?;
        let mut root = ComponentMetadata::project(
            ROOT_BUILD,
            ROOT_BUILD,
            module.with_version(self.project.version.clone()),
        );
        for (index, spec) in self.dependencies.iter().enumerate() {
            let field = format!("dependencies[{}]", index);
            root.dependencies.push(spec.to_dependency(&field)?);
        }
        Ok(root)
    }

    /// Build the repository declared by the `[[repository]]` entries
    pub fn build_repository(&self) -> ConfigResult<InMemoryRepository> {
        let mut repository = InMemoryRepository::new();
        for (index, entry) in self.repository.iter().enumerate() {
            repository.add(entry.to_metadata(&format!("repository[{}]", index))?);
        }
        debug!(
            "Built repository with {} components for {}",
            repository.component_count(),
            self.project.name
        );
        Ok(repository)
    }
}

impl DependencySpec {
    /// Dependency on a module requiring `version`
    pub fn module(module: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// The declared version constraint
    pub fn version_constraint(&self) -> VersionConstraint {
        VersionConstraint {
            required: self.version.clone().unwrap_or_default(),
            preferred: self.prefer.clone().unwrap_or_default(),
            strict: self.strictly.clone().unwrap_or_default(),
            rejected: self.reject.clone(),
        }
    }

    /// Convert to dependency metadata, validating coordinates and selectors.
    /// `field` names the entry in error messages.
    pub fn to_dependency(&self, field: &str) -> ConfigResult<DependencyMetadata> {
        let selector = match (&self.module, &self.project) {
            (Some(coordinates), None) => {
                let module = parse_module(coordinates, field)?;
                let constraint = self.version_constraint();
                ResolvedVersionConstraint::new(&constraint).map_err(|e| {
                    DepotError::config(format!("{}.version", field), e.to_string())
                })?;
                ComponentSelector::module(module, constraint)
            },
            (None, Some(path)) => {
                if !path.starts_with(':') {
                    return Err(DepotError::config(
                        format!("{}.project", field),
                        format!("project path '{}' must start with ':'", path),
                    ));
                }
                if self.version.is_some() || self.strictly.is_some() || self.prefer.is_some() {
                    return Err(DepotError::config(
                        field,
                        "project dependencies cannot declare versions",
                    ));
                }
                ComponentSelector::project(ROOT_BUILD, path.clone())
            },
            (Some(_), Some(_)) => {
                return Err(DepotError::config(
                    field,
                    "a dependency declares either 'module' or 'project', not both",
                ))
            },
            (None, None) => {
                return Err(DepotError::config(
                    field,
                    "a dependency must declare 'module' or 'project'",
                ))
            },
        };

        let mut dependency = DependencyMetadata::new(selector);
        dependency.force = self.force;
        dependency.constraint = self.constraint;
        dependency.changing = self.changing;
        dependency.reason = self.because.clone();
        Ok(dependency)
    }
}

impl RepositoryEntry {
    /// Convert to component metadata. Dependencies of a virtual platform are
    /// lenient platform constraints on its members.
    pub fn to_metadata(&self, field: &str) -> ConfigResult<ComponentMetadata> {
        let module = parse_module(&self.module, field)?;
        if self.version.trim().is_empty() {
            return Err(DepotError::config(
                format!("{}.version", field),
                format!("component {} must declare a version", module),
            ));
        }
        let module_version = module.with_version(self.version.clone());

        let mut metadata = match &self.project {
            Some(path) => ComponentMetadata::project(ROOT_BUILD, path.clone(), module_version),
            None => ComponentMetadata::new(module_version),
        };
        metadata.status = self.status;
        if self.virtual_platform {
            metadata = metadata.as_virtual_platform();
        }
        for platform in &self.belongs_to {
            metadata = metadata.belongs_to(parse_module(platform, &format!("{}.belongs-to", field))?);
        }
        for (index, spec) in self.dependencies.iter().enumerate() {
            let mut dependency =
                spec.to_dependency(&format!("{}.dependencies[{}]", field, index))?;
            if self.virtual_platform {
                dependency = dependency.as_constraint().lenient_platform();
            }
            metadata.dependencies.push(dependency);
        }
        Ok(metadata)
    }
}

fn parse_module(coordinates: &str, field: &str) -> ConfigResult<ModuleIdentifier> {
    ModuleIdentifier::parse(coordinates).map_err(|e| DepotError::config(field, e.to_string()))
}

/// Parse a depot.toml document. `file` names the source in error messages.
pub fn parse_depot_toml(content: &str, file: &str) -> ConfigResult<DepotToml> {
    // toml_edit reports syntax errors with precise spans
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| parse_error(file, content, e.message(), e.span()))?;

    let config: DepotToml = toml::from_str(content)
        .map_err(|e| parse_error(file, content, e.message(), e.span()))?;

    validate_config(&config)?;
    Ok(config)
}

/// Serialize a manifest back to TOML
pub fn serialize_depot_toml(config: &DepotToml) -> ConfigResult<String> {
    toml::to_string_pretty(config)
        .map_err(|e| DepotError::config("manifest", format!("TOML serialization error: {}", e)))
}

/// Validate configuration completeness
pub fn validate_config(config: &DepotToml) -> ConfigResult<()> {
    if config.project.group.trim().is_empty() || config.project.name.trim().is_empty() {
        return Err(DepotError::config(
            "project",
            "group and name are required in the [project] section",
        ));
    }
    if config.resolution.max_iterations == Some(0) {
        return Err(DepotError::config(
            "resolution.max-iterations",
            "must be at least 1",
        ));
    }

    config.root_component()?;
    config.build_repository()?;
    Ok(())
}

/// Load and parse depot.toml from a file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<DepotToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DepotError::io(format!("Failed to read {}", path), e))?;
    parse_depot_toml(&content, path.as_str())
}

pub(crate) fn parse_error(
    file: &str,
    content: &str,
    message: &str,
    span: Option<std::ops::Range<usize>>,
) -> DepotError {
    let (line, column) = span
        .map(|span| line_column(content, span.start))
        .unwrap_or((1, 1));
    DepotError::TomlParse {
        file: file.to_string(),
        message: message.trim().to_string(),
        line,
        column,
    }
}

/// One-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = content.get(..offset).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |tail| tail.chars().count()) + 1;
    (line, column)
}
