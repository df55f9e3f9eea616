//! Common utilities and fixtures for benchmarks

use std::fmt::Write;
use std::sync::Arc;

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};

use depot_core::{ComponentMetadata, DependencyMetadata, ModuleIdentifier, VersionConstraint};
use depot_resolver::{DependencyToComponentIdResolver, InMemoryRepository, SelectorState};

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(2))
        .measurement_time(std::time::Duration::from_secs(5))
        .sample_size(50)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

pub fn module(layer: usize, index: usize) -> ModuleIdentifier {
    ModuleIdentifier::new(format!("org.layer{}", layer), format!("m{}", index))
}

pub fn version(minor: usize) -> String {
    format!("1.{}", minor)
}

/// Repository of `layers` layers of `width` modules with `versions`
/// versions each. Every version depends on two modules of the next layer
/// with a range, so each module in layers below the first is reached by
/// conflicting requests.
pub fn layered_repository(layers: usize, width: usize, versions: usize) -> InMemoryRepository {
    let mut repository = InMemoryRepository::new();
    for layer in 0..layers {
        for index in 0..width {
            for minor in 0..versions {
                let mut metadata = ComponentMetadata::new(module(layer, index).with_version(version(minor)));
                if layer + 1 < layers {
                    for offset in 0..2 {
                        let target = module(layer + 1, (index + offset) % width);
                        let range = format!("[1.0,1.{}]", minor.max(1));
                        metadata.dependencies.push(DependencyMetadata::requiring(target, range));
                    }
                }
                repository.add(metadata);
            }
        }
    }
    repository
}

/// Root project depending on every module of the first layer
pub fn root_component(width: usize) -> ComponentMetadata {
    let mut root = ComponentMetadata::project(":", ":", ModuleIdentifier::new("bench", "root").with_version("1.0"));
    for index in 0..width {
        root.dependencies
            .push(DependencyMetadata::requiring(module(0, index), "1.+"));
    }
    root
}

/// Selectors on one module mixing ranges, exact versions, prefers and
/// rejections
pub fn selector_group(
    target: &ModuleIdentifier,
    count: usize,
    versions: usize,
    repository: &Arc<dyn DependencyToComponentIdResolver>,
) -> Vec<SelectorState> {
    (0..count)
        .filter_map(|i| {
            let constraint = match i % 4 {
                0 => VersionConstraint::required(format!("[1.0,{})", version(versions))),
                1 => VersionConstraint::required(version(i % versions)),
                2 => VersionConstraint::required("1.+").prefer(version(versions / 2)),
                _ => VersionConstraint::required("1.+").reject(version(versions - 1)),
            };
            let dependency = DependencyMetadata::module(target.clone(), constraint);
            SelectorState::new(i as u64, dependency, target.clone(), Arc::clone(repository)).ok()
        })
        .collect()
}

/// depot.toml content with `dependencies` root dependencies and a
/// repository of matching components
pub fn manifest_content(dependencies: usize) -> String {
    let mut content = String::from("[project]\ngroup = \"bench\"\nname = \"root\"\nversion = \"1.0\"\n\n");
    content.push_str("[resolution]\nconflict-resolution = \"latest\"\n\n");
    for index in 0..dependencies {
        let _ = write!(
            content,
            "[[dependencies]]\nmodule = \"org.bench:m{}\"\nversion = \"[1.0,2.0)\"\nreject = [\"1.3\"]\n\n",
            index
        );
    }
    for index in 0..dependencies {
        for minor in 0..3 {
            let _ = write!(
                content,
                "[[repository]]\nmodule = \"org.bench:m{}\"\nversion = \"1.{}\"\n\n",
                index, minor
            );
        }
    }
    content
}

/// Lock file content with `entries` locked modules
pub fn lock_content(entries: usize) -> String {
    let mut content = String::from("# bench lock file\n");
    for index in 0..entries {
        let _ = writeln!(content, "org.bench:m{}:1.{}", index, index % 10);
    }
    content.push_str("empty=\n");
    content
}
