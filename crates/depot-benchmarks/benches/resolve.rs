//! Dependency resolution performance benchmarks
//!
//! Benchmarks selector resolution for a single module, conflict-heavy graph
//! building and parallel per-module selection.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use depot_benchmarks::{criterion_config, layered_repository, module, root_component, selector_group};
use depot_core::{ModuleIdentifier, Version};
use depot_resolver::{
    resolve_modules_parallel, ComponentRegistry, ConflictResolver, DependencyGraphBuilder,
    DependencyToComponentIdResolver, SelectorState, SelectorStateResolver, VersionSelector,
};

/// Benchmark selecting one component from many selectors
fn bench_select_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_best");

    for selector_count in [2, 8, 32, 128].iter() {
        group.throughput(Throughput::Elements(*selector_count as u64));

        let repository: Arc<dyn DependencyToComponentIdResolver> = Arc::new(layered_repository(1, 1, 20));
        let target = module(0, 0);

        group.bench_with_input(
            BenchmarkId::new("selectors", selector_count),
            selector_count,
            |b, &selector_count| {
                b.iter(|| {
                    // fresh selectors so no result is memoised between iterations
                    let selectors = selector_group(&target, selector_count, 20, &repository);
                    let refs: Vec<&SelectorState> = selectors.iter().collect();
                    let resolver = SelectorStateResolver::new(
                        ConflictResolver::default(),
                        Arc::new(ComponentRegistry::new()),
                    );
                    black_box(resolver.select_best(&target, &refs).ok())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark fixed-point graph building for growing graphs
fn bench_graph_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_resolution");
    group.sample_size(20);

    for width in [5, 20, 50].iter() {
        let layers = 4;
        group.throughput(Throughput::Elements((layers * width) as u64));

        let repository: Arc<dyn DependencyToComponentIdResolver> =
            Arc::new(layered_repository(layers, *width, 10));
        let root = root_component(*width);

        group.bench_with_input(BenchmarkId::new("modules", layers * width), width, |b, _| {
            b.iter(|| {
                let builder = DependencyGraphBuilder::new(Arc::clone(&repository));
                black_box(builder.resolve(&root).ok())
            });
        });
    }

    group.finish();
}

/// Benchmark disjoint module groups resolved on the rayon pool
fn bench_parallel_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_selection");

    for module_count in [16, 64, 256].iter() {
        group.throughput(Throughput::Elements(*module_count as u64));

        let repository: Arc<dyn DependencyToComponentIdResolver> =
            Arc::new(layered_repository(1, *module_count, 10));

        group.bench_with_input(
            BenchmarkId::new("modules", module_count),
            module_count,
            |b, &module_count| {
                b.iter(|| {
                    let selectors: Vec<(ModuleIdentifier, Vec<SelectorState>)> = (0..module_count)
                        .map(|index| {
                            let target = module(0, index);
                            let states = selector_group(&target, 4, 10, &repository);
                            (target, states)
                        })
                        .collect();
                    let groups: Vec<(ModuleIdentifier, Vec<&SelectorState>)> = selectors
                        .iter()
                        .map(|(target, states)| (target.clone(), states.iter().collect()))
                        .collect();
                    let resolver = SelectorStateResolver::new(
                        ConflictResolver::default(),
                        Arc::new(ComponentRegistry::new()),
                    );
                    black_box(resolve_modules_parallel(&resolver, &groups).ok())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark version parsing, ordering and selector acceptance
fn bench_version_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_operations");

    let version_strings: Vec<String> = (0..1000)
        .map(|i| match i % 4 {
            0 => format!("{}.{}.{}", i / 100, (i / 10) % 10, i % 10),
            1 => format!("{}.{}-rc{}", i / 100, i % 10, i % 3),
            2 => format!("{}.{}-SNAPSHOT", i / 100, i % 10),
            _ => format!("{}.{}.{}-alpha", i / 100, (i / 10) % 10, i % 10),
        })
        .collect();
    let versions: Vec<Version> = version_strings.iter().map(|v| Version::parse(v)).collect();

    group.bench_function("version_parsing", |b| {
        let mut index = 0;
        b.iter(|| {
            let version = &version_strings[index % version_strings.len()];
            index += 1;
            black_box(Version::parse(version))
        });
    });

    group.bench_function("version_sorting", |b| {
        b.iter(|| {
            let mut sorted = versions.clone();
            sorted.sort();
            black_box(sorted)
        });
    });

    group.bench_function("selector_acceptance", |b| {
        let selectors: Vec<VersionSelector> = ["[1.0,5.0)", "2.+", "3.4.5", "(,4.2]"]
            .iter()
            .filter_map(|s| VersionSelector::parse(s).ok())
            .collect();
        let mut index = 0;
        b.iter(|| {
            let selector = &selectors[index % selectors.len()];
            let version = &versions[index % versions.len()];
            index += 1;
            black_box(selector.accept_version(version))
        });
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_select_best, bench_graph_resolution, bench_parallel_selection, bench_version_operations
}
criterion_main!(benches);
