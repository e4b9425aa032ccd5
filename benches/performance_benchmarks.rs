use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use healthpulse::{AppConfig, DerivedMetricCalculator, MetricDefinition, MetricStore, TracingSink};
use std::sync::Arc;

/// Benchmarks for the per-tick hot path: store writes, derived recomputation
/// and a full scheduler tick.

fn bench_store_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("MetricStore set");

    for &capacity in &[20usize, 200, 2000] {
        let mut store = MetricStore::new();
        store
            .register(
                MetricDefinition::new("heart_rate", "bpm", 60.0, 100.0, 72.0)
                    .with_history_capacity(capacity),
            )
            .unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("set", capacity), &capacity, |b, _| {
            let mut value = 60.0;
            b.iter(|| {
                value = if value >= 100.0 { 60.0 } else { value + 1.0 };
                let _ = store.set("heart_rate", black_box(value));
            });
        });
    }

    group.finish();
}

fn bench_recompute_dependents(c: &mut Criterion) {
    let config = AppConfig::default();
    let calculator = config.build_calculator().unwrap();
    let mut store = config.build_store(&calculator).unwrap();

    c.bench_function("recompute_dependents steps", |b| {
        b.iter(|| {
            let _ = store.recompute_dependents(black_box("steps"), &calculator);
        });
    });
}

fn bench_derived_calculations(c: &mut Criterion) {
    let calculator = DerivedMetricCalculator::default();
    let activities = ["Running", "Walking", "Yoga", "UnknownSport"];

    c.bench_function("calories_from_activity", |b| {
        b.iter(|| {
            for activity in &activities {
                black_box(calculator.calories_from_activity(activity, black_box(45.0)));
            }
        });
    });

    c.bench_function("progress_percentage", |b| {
        b.iter(|| DerivedMetricCalculator::progress_percentage(black_box(5420.0), black_box(10000.0)));
    });
}

fn bench_scheduler_tick(c: &mut Criterion) {
    let mut config = AppConfig::default();
    config.simulation.seed = Some(1);
    let scheduler = config.build_scheduler(Arc::new(TracingSink)).unwrap();

    let mut group = c.benchmark_group("Scheduler tick");
    for family in ["heart_rate", "steps"] {
        group.bench_function(family, |b| {
            b.iter(|| {
                let _ = scheduler.tick(black_box(family));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_store_set,
    bench_recompute_dependents,
    bench_derived_calculations,
    bench_scheduler_tick
);

criterion_main!(benches);
