//! Configuration layering, fallback logic, and environment overrides

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use depot_core::DepotError;
use depot_resolver::{ConflictResolution, DEFAULT_MAX_ITERATIONS};

use crate::lockfile::LOCK_FILE_NAME;
use crate::manifest::{self, DepotToml, ResolutionSection};
use crate::ConfigResult;

/// Manifest file name
pub const MANIFEST_NAME: &str = "depot.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "DEPOT_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Explicit manifest, skipping the directory walk
    manifest_path: Option<Utf8PathBuf>,
    /// Global config file, `~/.depot/config.toml` unless overridden
    global_path: Option<Utf8PathBuf>,
}

/// Where a setting came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Default,
    /// Global config file
    Global(Utf8PathBuf),
    /// Project depot.toml file
    ProjectToml(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

/// Global config file contents
#[derive(Debug, Clone, Default, Deserialize)]
struct GlobalConfig {
    #[serde(default)]
    resolution: ResolutionSection,
}

/// Effective resolution options after layering
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionSettings {
    pub conflict_resolution: ConflictResolution,
    pub max_iterations: usize,
    pub lock_file: Utf8PathBuf,
    /// Source of the conflict resolution strategy
    pub conflict_resolution_source: ConfigSource,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            lock_file: Utf8PathBuf::from(LOCK_FILE_NAME),
            conflict_resolution_source: ConfigSource::Default,
        }
    }
}

/// A loaded project: manifest plus effective settings
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub manifest: DepotToml,
    pub manifest_path: Utf8PathBuf,
    pub settings: ResolutionSettings,
}

impl ProjectConfig {
    /// Directory holding the manifest
    pub fn project_dir(&self) -> &Utf8Path {
        self.manifest_path.parent().unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Lock file path, resolved against the manifest directory
    pub fn lock_file_path(&self) -> Utf8PathBuf {
        if self.settings.lock_file.is_absolute() {
            self.settings.lock_file.clone()
        } else {
            self.project_dir().join(&self.settings.lock_file)
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self {
            cwd,
            manifest_path: None,
            global_path: default_global_path(),
        }
    }

    /// Load this manifest instead of searching for one
    pub fn with_manifest_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.manifest_path = path.map(|path| {
            if path.is_absolute() {
                path
            } else {
                self.cwd.join(path)
            }
        });
        self
    }

    /// Use a specific global config file
    pub fn with_global_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Load the project manifest and layer every settings source over it
    pub async fn load(&self, cli_overrides: HashMap<String, String>) -> ConfigResult<ProjectConfig> {
        let (manifest, source) = self.load_project_config().await?;
        let ConfigSource::ProjectToml(manifest_path) = source else {
            return Err(DepotError::invalid_state("project config loaded from a non-manifest source"));
        };

        let global = self.load_global_config().await?;
        let settings = ConfigLayering::new(manifest.resolution.clone())
            .with_project_path(manifest_path.clone())
            .with_global(global)
            .with_env_overrides(ConfigLayering::collect_env_overrides())
            .with_cli_overrides(cli_overrides)
            .merge()?;

        Ok(ProjectConfig {
            manifest,
            manifest_path,
            settings,
        })
    }

    /// Load the project manifest
    pub async fn load_project_config(&self) -> ConfigResult<(DepotToml, ConfigSource)> {
        if let Some(path) = &self.manifest_path {
            if !path.exists() {
                return Err(DepotError::config("manifest", format!("{} does not exist", path)));
            }
            let config = manifest::load_from_file(path).await?;
            return Ok((config, ConfigSource::ProjectToml(path.clone())));
        }

        match self.resolve_config_path(MANIFEST_NAME) {
            Some(path) => {
                debug!("Loading manifest {}", path);
                let config = manifest::load_from_file(&path).await?;
                Ok((config, ConfigSource::ProjectToml(path)))
            },
            None => Err(DepotError::config(
                "manifest",
                format!(
                    "No {} found in {} or parent directories",
                    MANIFEST_NAME, self.cwd
                ),
            )),
        }
    }

    /// Find a configuration file by walking up from the working directory
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join(filename))
            .find(|path| path.exists())
    }

    /// Load the `[resolution]` section of the global config, if any
    pub async fn load_global_config(&self) -> ConfigResult<Option<(ResolutionSection, Utf8PathBuf)>> {
        let Some(path) = &self.global_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DepotError::io(format!("Failed to read {}", path), e))?;
        let global: GlobalConfig = toml::from_str(&content)
            .map_err(|e| manifest::parse_error(path.as_str(), &content, e.message(), e.span()))?;
        debug!("Loaded global config {}", path);
        Ok(Some((global.resolution, path.clone())))
    }
}

fn default_global_path() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir()?;
    let home = Utf8PathBuf::try_from(home).ok()?;
    Some(home.join(".depot").join("config.toml"))
}

/// Configuration layering and merging.
///
/// Precedence, lowest first: defaults, global config, project manifest,
/// `DEPOT_*` environment variables, command line flags.
#[derive(Debug, Default)]
pub struct ConfigLayering {
    project: ResolutionSection,
    project_path: Option<Utf8PathBuf>,
    global: Option<(ResolutionSection, Utf8PathBuf)>,
    env_overrides: HashMap<String, String>,
    cli_overrides: HashMap<String, String>,
}

impl ConfigLayering {
    pub fn new(project: ResolutionSection) -> Self {
        Self {
            project,
            ..Self::default()
        }
    }

    pub fn with_project_path(mut self, path: Utf8PathBuf) -> Self {
        self.project_path = Some(path);
        self
    }

    pub fn with_global(mut self, global: Option<(ResolutionSection, Utf8PathBuf)>) -> Self {
        self.global = global;
        self
    }

    pub fn with_env_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.env_overrides = overrides;
        self
    }

    /// Command line overrides keyed by `conflict-resolution`,
    /// `max-iterations` or `lock-file`
    pub fn with_cli_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.cli_overrides = overrides;
        self
    }

    /// Merge every layer into the effective settings
    pub fn merge(self) -> ConfigResult<ResolutionSettings> {
        let mut settings = ResolutionSettings::default();

        if let Some((global, path)) = &self.global {
            Self::apply_section(&mut settings, global, ConfigSource::Global(path.clone()));
        }
        let project_source = self
            .project_path
            .clone()
            .map_or(ConfigSource::Default, ConfigSource::ProjectToml);
        Self::apply_section(&mut settings, &self.project, project_source);

        Self::apply_env_overrides(&mut settings, &self.env_overrides)?;
        Self::apply_cli_overrides(&mut settings, &self.cli_overrides)?;

        debug!(
            "Resolution settings: {} (from {:?}), max {} iterations, lock file {}",
            settings.conflict_resolution,
            settings.conflict_resolution_source,
            settings.max_iterations,
            settings.lock_file
        );
        Ok(settings)
    }

    fn apply_section(settings: &mut ResolutionSettings, section: &ResolutionSection, source: ConfigSource) {
        if let Some(strategy) = section.conflict_resolution {
            settings.conflict_resolution = strategy;
            settings.conflict_resolution_source = source;
        }
        if let Some(max_iterations) = section.max_iterations {
            settings.max_iterations = max_iterations;
        }
        if let Some(lock_file) = &section.lock_file {
            settings.lock_file = lock_file.clone();
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(
        settings: &mut ResolutionSettings,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "DEPOT_CONFLICT_RESOLUTION" => {
                    settings.conflict_resolution = value.parse()?;
                    settings.conflict_resolution_source = ConfigSource::Environment(key.clone());
                },
                "DEPOT_MAX_ITERATIONS" => {
                    settings.max_iterations = parse_iterations(key, value)?;
                },
                "DEPOT_LOCK_FILE" => {
                    settings.lock_file = Utf8PathBuf::from(value);
                },
                _ => {
                    // Unknown environment variable, ignore
                },
            }
        }

        Ok(())
    }

    /// Apply CLI flag overrides
    fn apply_cli_overrides(
        settings: &mut ResolutionSettings,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "conflict-resolution" => {
                    settings.conflict_resolution = value.parse()?;
                    settings.conflict_resolution_source = ConfigSource::CommandLine;
                },
                "max-iterations" => {
                    settings.max_iterations = parse_iterations(key, value)?;
                },
                "lock-file" => {
                    settings.lock_file = Utf8PathBuf::from(value);
                },
                _ => {
                    // Unknown CLI override, ignore
                },
            }
        }

        Ok(())
    }

    /// Collect `DEPOT_*` environment variables
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

fn parse_iterations(field: &str, value: &str) -> ConfigResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(DepotError::config(field, "must be at least 1")),
        Ok(iterations) => Ok(iterations),
        Err(e) => Err(DepotError::config(field, format!("'{}' is not a number: {}", value, e))),
    }
}
