//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking a [`CommandContext`]. The
//! resolving commands share [`load_project`] and [`resolve_project`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use tracing::info;

use depot_config::{ConfigLoader, LockFile, ProjectConfig};
use depot_core::{ComponentMetadata, DepotError, DepotResult};
use depot_resolver::{DependencyGraphBuilder, InMemoryRepository, Resolution};

pub mod check;
pub mod insight;
pub mod lock;
pub mod resolve;


use crate::{output::OutputHandler, Commands, ResolveArgs};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub manifest: Option<Utf8PathBuf>,
    pub output: OutputHandler,
    /// Global config file; `None` uses `~/.depot/config.toml`
    pub global_config: Option<Utf8PathBuf>,
}

impl CommandContext {
    /// Create a new command context
    pub fn new(manifest: Option<PathBuf>) -> DepotResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| DepotError::io("Failed to get current directory", e))?;

        Ok(Self {
            cwd: utf8(cwd)?,
            manifest: manifest.map(utf8).transpose()?,
            output: OutputHandler::new(),
            global_config: None,
        })
    }

    fn loader(&self) -> ConfigLoader {
        let loader = ConfigLoader::new(self.cwd.clone()).with_manifest_path(self.manifest.clone());
        match &self.global_config {
            Some(path) => loader.with_global_path(Some(path.clone())),
            None => loader,
        }
    }
}

fn utf8(path: PathBuf) -> DepotResult<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| {
        DepotError::config("path", format!("{} is not valid UTF-8", e.into_path_buf().display()))
    })
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> DepotResult<()> {
    match command {
        Commands::Resolve {
            args,
            no_lock,
            json,
        } => {
            info!("Resolving dependencies (lock file: {})", !no_lock);
            resolve::execute(args, !no_lock, json, ctx).await
        },
        Commands::Insight { module, args } => {
            info!("Explaining selection of {}", module);
            insight::execute(module, args, ctx).await
        },
        Commands::Check => {
            info!("Checking configuration");
            check::execute(ctx).await
        },
        Commands::Lock { args } => {
            info!("Writing lock file");
            lock::execute(args, ctx).await
        },
    }
}

/// A loaded manifest ready to resolve
pub struct LoadedProject {
    pub config: ProjectConfig,
    pub root: ComponentMetadata,
    pub repository: Arc<InMemoryRepository>,
    pub lock: Option<LockFile>,
}

impl ResolveArgs {
    /// Command line overrides for the config layering
    pub fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(strategy) = &self.conflict_resolution {
            overrides.insert("conflict-resolution".to_string(), strategy.clone());
        }
        if let Some(max_iterations) = self.max_iterations {
            overrides.insert("max-iterations".to_string(), max_iterations.to_string());
        }
        overrides
    }
}

/// Load the manifest, layered settings and, if asked, the lock file
pub async fn load_project(
    args: &ResolveArgs,
    use_lock: bool,
    ctx: &CommandContext,
) -> DepotResult<LoadedProject> {
    let config = ctx.loader().load(args.overrides()).await?;
    let mut root = config.manifest.root_component()?;
    let repository = Arc::new(config.manifest.build_repository()?);

    let lock = if use_lock {
        LockFile::load(&config.lock_file_path()).await?
    } else {
        None
    };
    if let Some(lock) = &lock {
        lock.apply_to(&mut root);
    }

    Ok(LoadedProject {
        config,
        root,
        repository,
        lock,
    })
}

/// Run the graph builder for a loaded project
pub fn resolve_project(project: &LoadedProject) -> DepotResult<Resolution> {
    let settings = &project.config.settings;
    DependencyGraphBuilder::new(project.repository.clone())
        .with_conflict_resolution(settings.conflict_resolution)
        .with_max_iterations(settings.max_iterations)
        .resolve(&project.root)
}

/// Suggest a similar name based on edit distance
pub fn suggest_similar<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = edit_distance(input, candidate);
        if distance < best_distance && distance <= 2 {
            best_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match.map(str::to_string)
}

/// Levenshtein distance between two strings
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
