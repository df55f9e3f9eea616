//! # depot-cli
//!
//! Command line front end for the depot dependency resolver.
//!
//! Parses the command line, sets up logging and dispatches to the command
//! handlers. Errors are reported with the suggestion attached to them.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, error};

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Resolve dependency graphs declared in depot.toml
#[derive(Parser)]
#[command(name = "depot", version, about = "Dependency selector resolution")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Manifest to use instead of searching for depot.toml
    #[arg(long, global = true, env = "DEPOT_MANIFEST", value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by the commands that run a resolution
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Conflict resolution strategy (latest, strict, prefer-project-modules)
    #[arg(long, value_name = "STRATEGY")]
    pub conflict_resolution: Option<String>,

    /// Maximum number of selection rounds
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the dependency graph
    Resolve {
        #[command(flatten)]
        args: ResolveArgs,
        /// Ignore the lock file
        #[arg(long)]
        no_lock: bool,
        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Explain why a module was selected
    Insight {
        /// Module coordinates (group:name)
        module: String,
        #[command(flatten)]
        args: ResolveArgs,
    },
    /// Validate the manifest and lock file
    Check,
    /// Write the lock file from a fresh resolution
    Lock {
        #[command(flatten)]
        args: ResolveArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting depot v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let ctx = CommandContext::new(cli.manifest)?;
        commands::dispatch_command(cli.command, &ctx).await
    });

    if let Err(error) = &result {
        eprintln!("{}", ErrorFormatter::new().format_error(error));
        std::process::exit(1);
    }
    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "depot={level},depot_core={level},depot_resolver={level},depot_config={level}"
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("depot encountered an unexpected error: {}", panic_info);
        eprintln!("depot crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
