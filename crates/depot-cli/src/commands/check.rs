//! `depot check`: validate the manifest and lock file

use depot_core::DepotResult;

use super::{load_project, CommandContext};
use crate::ResolveArgs;

pub async fn execute(ctx: &CommandContext) -> DepotResult<()> {
    let project = load_project(&ResolveArgs::default(), true, ctx).await?;
    let manifest = &project.config.manifest;

    ctx.output.info(&format!("Checked {}", project.config.manifest_path));
    ctx.output.line(&format!(
        "{}: {} dependencies, {} repository components",
        project.root.module_version,
        manifest.dependencies.len(),
        project.repository.component_count()
    ));
    ctx.output.line(&format!(
        "conflict resolution: {} ({:?})",
        project.config.settings.conflict_resolution, project.config.settings.conflict_resolution_source
    ));
    match &project.lock {
        Some(lock) => ctx.output.line(&format!(
            "lock file: {} ({} locked modules)",
            project.config.lock_file_path(),
            lock.len()
        )),
        None => ctx.output.line("lock file: none"),
    }

    ctx.output.success("Configuration is valid");
    Ok(())
}
