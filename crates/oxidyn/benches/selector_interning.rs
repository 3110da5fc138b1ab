// Selector registration benchmarks for the OxideDyn runtime
//
// These benchmarks measure registering fresh selectors, re-registering
// known names, name lookup by handle, and lookup by name without
// registering.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use oxidyn::{Runtime, RuntimeConfig};

/// Benchmark registering previously unseen selector names.
///
/// Each iteration builds a fresh runtime so every name takes the
/// write-lock path.
fn bench_register_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_new");

    for count in [16, 256, 4_096].iter() {
        let names: Vec<String> = (0..*count).map(|i| format!("method{i}:with:")).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let rt = Runtime::with_config(RuntimeConfig::default().with_selector_capacity(count));
                for name in &names {
                    black_box(rt.register_selector(name));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark registering names that are already interned.
fn bench_register_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_existing");

    for name in ["init", "initWithFrame:", "performSelector:withObject:afterDelay:"] {
        group.bench_with_input(BenchmarkId::from_parameter(name), name, |b, name| {
            let rt = Runtime::new();
            rt.register_selector(name);
            b.iter(|| rt.register_selector(black_box(name)));
        });
    }

    group.finish();
}

/// Benchmark handle-to-name and name-to-handle lookups.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_lookup");
    let rt = Runtime::new();
    let selectors: Vec<_> = (0..1_000)
        .map(|i| rt.register_selector(&format!("sel{i}")))
        .collect();

    group.bench_function("selector_name", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % selectors.len();
            black_box(rt.selector_name(selectors[i]).unwrap());
        });
    });

    group.bench_function("find_selector_hit", |b| {
        b.iter(|| black_box(rt.find_selector(black_box("sel500"))));
    });

    group.bench_function("find_selector_miss", |b| {
        b.iter(|| black_box(rt.find_selector(black_box("notRegistered:"))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_register_new,
    bench_register_existing,
    bench_lookup
);
criterion_main!(benches);
