//! Benchmarks for classification and alternate resolution
//!
//! These cover the per-invocation hot path: every tracked path is classified
//! and every variant group resolved on each run.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hearth_core::HostAttributes;
use hearth_core::path::RelPath;
use hearth_engine::classify::PathClassifier;
use hearth_engine::resolve::{AlternateResolver, group_variants};

/// Tracked listing with `groups` logical names, each with several alternates
fn tracked_paths(groups: usize) -> Vec<RelPath> {
    let mut paths = Vec::with_capacity(groups * 5);
    for i in 0..groups {
        for suffix in [
            "",
            "##default",
            "##os.Linux",
            "##os.Linux,hostname.box",
            "##class.work,template",
        ] {
            let path = format!(".config/app_{i}/settings.conf{suffix}");
            paths.push(RelPath::from_slash(&path).expect("valid benchmark path"));
        }
    }
    paths
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let classifier = PathClassifier::default();

    for size in &[100, 1000, 5000] {
        let paths = tracked_paths(*size / 5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &paths, |b, paths| {
            b.iter(|| {
                let (managed, anomalies) =
                    classifier.classify_all(black_box(paths).iter().map(|p| (p, false)));
                black_box((managed.len(), anomalies.len()))
            });
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let classifier = PathClassifier::default();
    let host = HostAttributes::new("Linux")
        .with_hostname("box")
        .with_user("alice")
        .with_class("work");
    let resolver = AlternateResolver::new(&host);

    for size in &[100, 1000, 5000] {
        let paths = tracked_paths(*size / 5);
        let (managed, _) = classifier.classify_all(paths.iter().map(|p| (p, false)));
        let groups = group_variants(managed);

        group.bench_with_input(BenchmarkId::from_parameter(size), &groups, |b, groups| {
            b.iter(|| {
                let resolved = black_box(groups)
                    .iter()
                    .filter(|g| resolver.resolve(g).is_ok())
                    .count();
                black_box(resolved)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_resolve);
criterion_main!(benches);
