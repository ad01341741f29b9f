//! Benchmarks for the wide-atomic hot path
//!
//! Measures single-cell fetch_max per strategy, lock-step group updates at
//! several group sizes, and a full contended dispatch on the CPU backend.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use widelock_backends::{Arena, CpuBackend, Region};
use widelock_core::{LockStrategy, LockTable, SharedGrid, TrialConfig, TrialHarness, WideAtomic};

const CELLS: usize = 1024;
const LOCK_BITS: u32 = 10;

fn arena() -> Arena {
    Arena::zeroed(2 * CELLS + (1 << LOCK_BITS))
}

fn atomic(arena: &Arena, strategy: LockStrategy) -> WideAtomic<'_> {
    let grid = SharedGrid::new(arena.region(Region::new(0, 2 * CELLS)).unwrap(), CELLS as u32, 1, CELLS as u32).unwrap();
    let locks = LockTable::new(arena.region(Region::new(2 * CELLS, 1 << LOCK_BITS)).unwrap()).unwrap();
    WideAtomic::new(grid, locks, strategy)
}

fn benchmark_fetch_max(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_max");
    group.throughput(Throughput::Elements(1));

    for strategy in LockStrategy::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(strategy), &strategy, |b, &strategy| {
            let arena = arena();
            let atomic = atomic(&arena, strategy);
            let mut value = 0u64;
            b.iter(|| {
                value = value.wrapping_add(0x1_0000_0001);
                black_box(atomic.fetch_max(black_box(value as usize % CELLS), value));
            });
        });
    }

    group.finish();
}

fn benchmark_group_fetch_max(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_fetch_max");

    for lanes in [1usize, 8, 32, 64] {
        group.throughput(Throughput::Elements(lanes as u64));

        group.bench_with_input(BenchmarkId::from_parameter(lanes), &lanes, |b, &lanes| {
            let arena = arena();
            let atomic = atomic(&arena, LockStrategy::Cooperative);
            // Every fourth lane hits the same cell.
            let cells: Vec<usize> = (0..lanes).map(|lane| (lane / 4) * 7 % CELLS).collect();
            let values: Vec<u64> = (0..lanes as u64).map(|v| v << 32).collect();
            let mut previous = Vec::with_capacity(lanes);

            b.iter(|| {
                black_box(atomic.group_fetch_max(&cells, &values, &mut previous));
            });
        });
    }

    group.finish();
}

fn benchmark_contended_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_dispatch");
    group.sample_size(10);

    for strategy in [LockStrategy::Cooperative, LockStrategy::IndependentSpin] {
        let config = TrialConfig {
            grid_width: 8,
            grid_height: 8,
            iterations_per_worker: 32,
            worker_count: 1024,
            trial_count: 1,
            dispatches_per_trial: 1,
            lock_table_size_bits: 6,
            strategy,
            ..TrialConfig::for_smoke()
        };
        group.throughput(Throughput::Elements(config.total_records() as u64));

        let harness = TrialHarness::new(CpuBackend::new().unwrap(), config).unwrap();
        group.bench_function(BenchmarkId::from_parameter(strategy), |b| {
            b.iter(|| black_box(harness.run_trial(0).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_fetch_max,
    benchmark_group_fetch_max,
    benchmark_contended_dispatch
);
criterion_main!(benches);
