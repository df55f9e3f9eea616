//! `depot resolve`: print the resolved graph

use serde::Serialize;
use tracing::warn;

use depot_core::{ComponentIdentifier, DepotError, DepotResult};
use depot_resolver::{ComponentNode, Resolution, ResolvedGraph};

use super::{load_project, resolve_project, CommandContext};
use crate::output::colors::ColorSupport;
use crate::ResolveArgs;

/// Serializable view of a resolution
#[derive(Debug, Serialize)]
pub struct ResolutionReport {
    pub root: String,
    pub iterations: usize,
    pub resolution_time_ms: u64,
    pub components: Vec<ComponentReport>,
}

#[derive(Debug, Serialize)]
pub struct ComponentReport {
    pub id: String,
    pub module: String,
    pub version: String,
    pub reasons: Vec<String>,
    pub dependencies: Vec<DependencyReport>,
}

#[derive(Debug, Serialize)]
pub struct DependencyReport {
    pub requested: String,
    pub selected: String,
    pub constraint: bool,
}

pub async fn execute(
    args: ResolveArgs,
    use_lock: bool,
    json: bool,
    ctx: &CommandContext,
) -> DepotResult<()> {
    let project = load_project(&args, use_lock, ctx).await?;
    if let Some(lock) = &project.lock {
        ctx.output.info(&format!(
            "Using {} ({} locked modules)",
            project.config.lock_file_path(),
            lock.len()
        ));
    }

    let resolution = resolve_project(&project)?;
    if let Some(cycle) = resolution.graph.detect_cycles() {
        ctx.output
            .warn(&format!("Dependency cycle: {}", ResolvedGraph::format_cycle(&cycle)));
    }

    if json {
        let report = build_report(&resolution);
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| DepotError::invalid_state(format!("Failed to render resolution: {}", e)))?;
        ctx.output.line(&rendered);
    } else {
        for line in render_text(&resolution, ctx.output.colors()) {
            ctx.output.line(&line);
        }
    }

    ctx.output.success(&format!(
        "Resolved {} components in {} rounds ({} ms)",
        resolution.graph.component_count(),
        resolution.iterations,
        resolution.resolution_time_ms
    ));
    Ok(())
}

/// Components with dependents before their dependencies, or in selection
/// order when the graph has a cycle
pub fn ordered_components(resolution: &Resolution) -> Vec<&ComponentNode> {
    match resolution.graph.topological_sort() {
        Ok(order) => order
            .iter()
            .filter_map(|id| resolution.graph.get_component(id))
            .collect(),
        Err(e) => {
            warn!("Printing in selection order: {}", e);
            resolution.graph.components().collect()
        },
    }
}

fn describe_node(node: &ComponentNode) -> String {
    match &node.id {
        ComponentIdentifier::Module(_) => node.module_version.to_string(),
        ComponentIdentifier::Project(_) => format!("{} ({})", node.id, node.module_version),
    }
}

/// One line per component followed by its outgoing edges
pub fn render_text(resolution: &Resolution, colors: &ColorSupport) -> Vec<String> {
    let mut lines = Vec::new();
    for node in ordered_components(resolution) {
        let reasons: Vec<&str> = node.reasons.iter().map(|reason| reason.describe()).collect();
        lines.push(format!(
            "{} {}",
            colors.bold(&describe_node(node)),
            colors.dim(&format!("[{}]", reasons.join(", ")))
        ));

        for (target, edge) in resolution.graph.dependencies_of(&node.id) {
            let arrow = if edge.is_constraint() { "~>" } else { "->" };
            lines.push(format!(
                "  {} {} => {}",
                arrow,
                edge.dependency.selector,
                colors.cyan(&target.module_version.version)
            ));
        }
    }
    lines
}

pub fn build_report(resolution: &Resolution) -> ResolutionReport {
    let components = ordered_components(resolution)
        .into_iter()
        .map(|node| ComponentReport {
            id: node.id.to_string(),
            module: node.module_version.module.to_string(),
            version: node.module_version.version.clone(),
            reasons: node.reasons.iter().map(ToString::to_string).collect(),
            dependencies: resolution
                .graph
                .dependencies_of(&node.id)
                .into_iter()
                .map(|(target, edge)| DependencyReport {
                    requested: edge.dependency.selector.to_string(),
                    selected: target.module_version.to_string(),
                    constraint: edge.is_constraint(),
                })
                .collect(),
        })
        .collect();

    ResolutionReport {
        root: resolution.root.to_string(),
        iterations: resolution.iterations,
        resolution_time_ms: resolution.resolution_time_ms,
        components,
    }
}
