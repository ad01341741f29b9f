//! Benchmarks for the reduction oracle and the validator
//!
//! The oracle runs concurrently with the workload, so its cost bounds how
//! much of a dispatch it can hide behind.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use widelock_core::{generate_records, DifferentialValidator, ReductionOracle};

fn benchmark_oracle_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("oracle_compute");

    for records in [1_024usize, 16_384, 262_144] {
        group.throughput(Throughput::Elements(records as u64));

        group.bench_with_input(BenchmarkId::from_parameter(records), &records, |b, &records| {
            let mut rng = StdRng::seed_from_u64(1);
            let input = generate_records(&mut rng, records, 256, 256);
            let oracle = ReductionOracle::new(true);

            b.iter(|| black_box(oracle.compute(&input, 256, 256)));
        });
    }

    group.finish();
}

fn benchmark_validator_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator_compare");

    for side in [64u32, 256, 1024] {
        group.throughput(Throughput::Elements(side as u64 * side as u64));

        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, &side| {
            let mut rng = StdRng::seed_from_u64(2);
            let input = generate_records(&mut rng, side as usize * 4, side, side);
            let oracle = ReductionOracle::new(true);
            let expected = oracle.compute(&input, side, side);
            let actual = oracle.compute(&input[..input.len() / 2], side, side);
            let validator = DifferentialValidator::new(true);

            b.iter(|| black_box(validator.compare(&actual, &expected).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_oracle_compute, benchmark_validator_compare);
criterion_main!(benches);
