//! End-to-end trials on the CPU backend
//!
//! Covers the fixed single-cell scenarios, randomized max-combine
//! correctness for every protected strategy and both depth modes, and race
//! detection under heavy contention.

use widelock_backends::CpuBackend;
use widelock_core::{
    decode_records, encode_records, DepthEncoding, InputRecord, LockStrategy, PackedPixel, RaceClass, Result,
    TrialConfig, TrialHarness,
};

fn tiny_config(workers: u32, group_size: u32) -> TrialConfig {
    TrialConfig {
        grid_width: 2,
        grid_height: 2,
        iterations_per_worker: 1,
        worker_count: workers,
        trial_count: 1,
        dispatches_per_trial: 1,
        group_size,
        lock_table_size_bits: 4,
        ..TrialConfig::for_smoke()
    }
}

// ============================================================================
// Fixed scenarios
// ============================================================================

#[test]
fn test_single_record_lands_in_its_cell() -> Result<()> {
    widelock_tracing::init_for_tests();
    let harness = TrialHarness::new(CpuBackend::with_threads(4)?, tiny_config(1, 1))?;

    let report = harness.run_with_records(0, &[InputRecord::new(0, 0, 0.2, 0.9)])?;
    assert!(report.passed);
    assert_eq!(report.race_events(), 0);

    let grid = harness.grid_snapshot()?;
    let cell = grid.get(0, 0);
    assert_eq!(cell, PackedPixel::pack(0.2, 0.9, DepthEncoding::Quantized));
    assert_eq!(cell.color(), 0.2);
    assert!((cell.depth(DepthEncoding::Quantized) - 0.9).abs() <= 1.0 / 16_777_215.0);
    for (x, y) in [(1, 0), (0, 1), (1, 1)] {
        assert_eq!(grid.get(x, y), PackedPixel::ZERO);
    }
    Ok(())
}

#[test]
fn test_deeper_of_two_concurrent_records_wins() -> Result<()> {
    let shallow = InputRecord::new(1, 1, 0.2, 0.9);
    let deep = InputRecord::new(1, 1, 0.1, 0.95);
    let expected = PackedPixel::pack(0.1, 0.95, DepthEncoding::Quantized);

    // One lane per group races across threads; two lanes per group race in lock-step.
    for group_size in [1, 2] {
        let harness = TrialHarness::new(CpuBackend::with_threads(4)?, tiny_config(2, group_size))?;
        for trial in 0..50 {
            let records = if trial % 2 == 0 { [shallow, deep] } else { [deep, shallow] };
            let report = harness.run_with_records(trial, &records)?;
            assert!(report.passed, "trial {trial} group_size {group_size}");
            assert_eq!(harness.grid_snapshot()?.get(1, 1), expected);
        }
    }
    Ok(())
}

#[test]
fn test_records_decoded_from_wire_drive_a_trial() -> Result<()> {
    let records: Vec<InputRecord> = (0..8)
        .map(|i| InputRecord::new(i % 2, i / 4, 0.1 * i as f32, 1.0 - 0.1 * i as f32))
        .collect();
    let decoded = decode_records(&encode_records(&records))?;
    assert_eq!(decoded, records);

    let config = TrialConfig {
        iterations_per_worker: 2,
        ..tiny_config(4, 2)
    };
    let harness = TrialHarness::new(CpuBackend::with_threads(4)?, config)?;
    assert!(harness.run_with_records(0, &decoded)?.passed);
    Ok(())
}

// ============================================================================
// Randomized max-combine correctness
// ============================================================================

#[test]
fn test_protected_strategies_match_oracle_exactly() -> Result<()> {
    widelock_tracing::init_for_tests();
    for strategy in [LockStrategy::Cooperative, LockStrategy::IndependentSpin] {
        for quantize_depth in [true, false] {
            let config = TrialConfig {
                grid_width: 16,
                grid_height: 12,
                iterations_per_worker: 32,
                worker_count: 300,
                trial_count: 2,
                dispatches_per_trial: 2,
                lock_table_size_bits: 5,
                group_size: 32,
                quantize_depth,
                strategy,
                seed: 0xC0FFEE,
                ..TrialConfig::for_smoke()
            };
            let harness = TrialHarness::new(CpuBackend::with_threads(8)?, config)?;
            let summary = harness.run()?;

            assert!(summary.passed(), "{strategy} quantize={quantize_depth}");
            assert_eq!(summary.total_race_events, 0);
            for trial in &summary.trials {
                assert_eq!(trial.leaked_locks, 0);
                for dispatch in &trial.dispatches {
                    assert_eq!(dispatch.comparison.deviation.color, 0.0);
                    assert_eq!(dispatch.comparison.deviation.depth, 0.0);
                    assert_eq!(dispatch.comparison.mismatched_cells, 0);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_every_dispatch_is_reported() -> Result<()> {
    let config = TrialConfig {
        trial_count: 1,
        dispatches_per_trial: 4,
        ..TrialConfig::for_smoke()
    };
    let harness = TrialHarness::new(CpuBackend::with_threads(4)?, config)?;
    let report = harness.run_trial(0)?;

    assert_eq!(report.dispatches.len(), 4);
    let numbers: Vec<u32> = report.dispatches.iter().map(|d| d.dispatch).collect();
    assert_eq!(numbers, vec![0, 1, 2, 3]);
    assert!(report.passed);
    Ok(())
}

// ============================================================================
// Race detection under contention
// ============================================================================

fn contended_config(strategy: LockStrategy) -> TrialConfig {
    TrialConfig {
        grid_width: 4,
        grid_height: 4,
        iterations_per_worker: 64,
        worker_count: 1024,
        trial_count: 3,
        dispatches_per_trial: 2,
        lock_table_size_bits: 4,
        group_size: 32,
        critical_section_dwell: 128,
        strategy,
        ..TrialConfig::for_smoke()
    }
}

#[test]
fn test_unprotected_updates_are_detected() -> Result<()> {
    let config = contended_config(LockStrategy::Unprotected);
    assert!(config.contention_ratio() >= 256.0);

    let harness = TrialHarness::new(CpuBackend::with_threads(8)?, config)?;
    let summary = harness.run()?;

    assert!(summary.total_race_events > 0, "no races recorded without locking");
    let per_class: u64 = RaceClass::ALL
        .iter()
        .map(|&class| summary.trials.iter().map(|t| t.race_count(class)).sum::<u64>())
        .sum();
    assert_eq!(per_class, summary.total_race_events);
    Ok(())
}

#[test]
fn test_locked_strategies_record_no_races_under_contention() -> Result<()> {
    for strategy in [LockStrategy::Cooperative, LockStrategy::IndependentSpin] {
        let config = TrialConfig {
            trial_count: 1,
            ..contended_config(strategy)
        };
        let harness = TrialHarness::new(CpuBackend::with_threads(8)?, config)?;
        let summary = harness.run()?;

        assert_eq!(summary.total_race_events, 0, "{strategy}");
        assert!(summary.race_totals.is_empty());
        assert!(summary.passed(), "{strategy}");
    }
    Ok(())
}
