//! `depot insight`: explain why a module was selected

use depot_core::{DepotError, DepotResult, ModuleIdentifier};
use depot_resolver::Resolution;

use super::{load_project, resolve_project, suggest_similar, CommandContext};
use crate::ResolveArgs;

pub async fn execute(module: String, args: ResolveArgs, ctx: &CommandContext) -> DepotResult<()> {
    let module = ModuleIdentifier::parse(&module)?;
    let project = load_project(&args, true, ctx).await?;
    let resolution = resolve_project(&project)?;

    match explain(&resolution, &module) {
        Some(lines) => {
            for line in lines {
                ctx.output.line(&line);
            }
            Ok(())
        },
        None => {
            let known: Vec<String> = project
                .repository
                .modules()
                .map(ToString::to_string)
                .collect();
            if let Some(suggestion) =
                suggest_similar(&module.to_string(), known.iter().map(String::as_str))
            {
                ctx.output.info(&format!("Did you mean '{}'?", suggestion));
            }
            Err(DepotError::config(
                "module",
                format!("{} is not part of the resolved graph", module),
            ))
        },
    }
}

/// Selection reasons and incoming edges of the component selected for
/// `module`, or `None` when the module was not selected
pub fn explain(resolution: &Resolution, module: &ModuleIdentifier) -> Option<Vec<String>> {
    let node = resolution.selected(module)?;

    let mut lines = vec![node.module_version.to_string()];
    lines.push("  Selection reasons:".to_string());
    for reason in &node.reasons {
        lines.push(format!("    - {}", reason));
    }

    let mut dependents = resolution.graph.dependents_of(&node.id);
    dependents.sort_by(|a, b| a.0.module_version.cmp(&b.0.module_version));
    if !dependents.is_empty() {
        lines.push("  Requested by:".to_string());
        for (dependent, edge) in dependents {
            let kind = if edge.is_constraint() { "constraint" } else { "dependency" };
            let mut line = format!(
                "    {} ({} {})",
                dependent.module_version, kind, edge.dependency.selector
            );
            if let Some(reason) = &edge.dependency.reason {
                line.push_str(&format!(": {}", reason));
            }
            lines.push(line);
        }
    }
    Some(lines)
}
