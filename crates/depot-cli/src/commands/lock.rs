//! `depot lock`: write the lock file from a fresh resolution

use depot_config::LockFile;
use depot_core::DepotResult;

use super::{load_project, resolve_project, CommandContext};
use crate::ResolveArgs;

pub async fn execute(args: ResolveArgs, ctx: &CommandContext) -> DepotResult<()> {
    // the existing lock file must not pin the new resolution
    let project = load_project(&args, false, ctx).await?;
    let resolution = resolve_project(&project)?;

    let lock = LockFile::from_resolution(&resolution);
    let path = project.config.lock_file_path();
    lock.write(&path).await?;

    ctx.output.success(&format!("Locked {} modules in {}", lock.len(), path));
    Ok(())
}
