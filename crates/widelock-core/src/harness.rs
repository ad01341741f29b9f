//! Randomized trial orchestration
//!
//! Each trial runs:
//!
//! ```text
//! GenerateInput → Reset → Launch ─┬─ Oracle (control thread) ─┬─ Validate → Report
//!                                 └─ Await workload ──────────┘
//! ```
//!
//! followed by `dispatches_per_trial - 1` further reset/dispatch/validate
//! rounds on the same input, all checked against the one oracle result.

use crate::config::TrialConfig;
use crate::error::{Error, Result};
use crate::grid::{GridSnapshot, SharedGrid};
use crate::instrumentation::{DispatchMetrics, TrialMetrics};
use crate::layout::ArenaLayout;
use crate::lock_table::LockTable;
use crate::oracle::ReductionOracle;
use crate::record::{generate_records, InputRecord};
use crate::tally::{ErrorTally, RaceClass};
use crate::validator::{Comparison, DifferentialValidator, RaceCount};
use crate::wide_atomic::WideAtomic;
use crate::workload::{MaxCombineKernel, OccupancyMap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use widelock_backends::{Arena, Backend, DispatchStats, LaunchConfig};
use widelock_tracing::{perf_event, perf_span, perf_span_threshold, timed_block};

// Validation spans shorter than this are not reported.
const VALIDATE_SPAN_THRESHOLD_US: u64 = 1_000;

/// Validation result of one workload dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub dispatch: u32,
    pub comparison: Comparison,
    /// Nonzero race counters
    pub races: Vec<RaceCount>,
    pub race_events: u64,
    pub workload_us: u64,
}

impl DispatchReport {
    pub fn passed(&self) -> bool {
        self.comparison.is_exact()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialReport {
    pub trial: u32,
    /// Seed the trial's records were drawn from
    pub seed: u64,
    pub records: usize,
    /// Most lock slots found held after any dispatch
    pub leaked_locks: usize,
    pub dispatches: Vec<DispatchReport>,
    /// Every dispatch matched the oracle exactly
    pub passed: bool,
    pub duration_us: u64,
}

impl TrialReport {
    pub fn race_events(&self) -> u64 {
        self.dispatches.iter().map(|d| d.race_events).sum()
    }

    /// Events of one class across all dispatches
    pub fn race_count(&self, class: RaceClass) -> u64 {
        self.dispatches
            .iter()
            .flat_map(|d| &d.races)
            .filter(|r| r.code == class.code())
            .map(|r| r.count as u64)
            .sum()
    }

    pub fn mismatched_cells(&self) -> usize {
        self.dispatches.iter().map(|d| d.comparison.mismatched_cells).sum()
    }
}

/// Outcome of [`TrialHarness::run`]
#[derive(Debug, Clone, Serialize)]
pub struct HarnessSummary {
    pub backend: &'static str,
    pub config: TrialConfig,
    pub failed_trials: usize,
    pub total_race_events: u64,
    /// Events per class code over all trials
    pub race_totals: BTreeMap<usize, u64>,
    pub trials: Vec<TrialReport>,
}

impl HarnessSummary {
    pub fn new(backend: &'static str, config: TrialConfig, trials: Vec<TrialReport>) -> Self {
        let mut race_totals = BTreeMap::new();
        for race in trials.iter().flat_map(|t| &t.dispatches).flat_map(|d| &d.races) {
            *race_totals.entry(race.code).or_insert(0) += race.count as u64;
        }

        Self {
            backend,
            config,
            failed_trials: trials.iter().filter(|t| !t.passed).count(),
            total_race_events: race_totals.values().sum(),
            race_totals,
            trials,
        }
    }

    pub fn passed(&self) -> bool {
        self.failed_trials == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Views over the arena regions for one trial
struct SharedState<'a> {
    wide: WideAtomic<'a>,
    occupancy: OccupancyMap<'a>,
    tally: ErrorTally<'a>,
}

/// Runs trials of the max-combine workload on a backend.
///
/// The arena is planned and allocated once in [`TrialHarness::new`] and
/// reused by every trial.
pub struct TrialHarness<B: Backend> {
    backend: B,
    config: TrialConfig,
    layout: ArenaLayout,
    arena: Arena,
    launch: LaunchConfig,
    oracle: ReductionOracle,
    validator: DifferentialValidator,
}

impl<B: Backend> TrialHarness<B> {
    /// Validate `config`, plan the arena layout and allocate the arena.
    pub fn new(backend: B, config: TrialConfig) -> Result<Self> {
        config.validate()?;
        if config.group_size > backend.max_group_size() {
            return Err(Error::invalid_config(format!(
                "group_size {} exceeds backend '{}' maximum {}",
                config.group_size,
                backend.name(),
                backend.max_group_size()
            )));
        }

        let layout = ArenaLayout::for_backend(&config, &backend)?;
        let arena = backend.allocate_arena(layout.total_words)?;
        let launch = LaunchConfig::linear(config.worker_count, config.group_size);

        tracing::info!(
            backend = backend.name(),
            strategy = %config.strategy,
            grid = %format!("{}x{}", config.grid_width, config.grid_height),
            workers = config.worker_count,
            iterations = config.iterations_per_worker,
            contention_ratio = config.contention_ratio(),
            arena_words = layout.total_words,
            "trial harness ready"
        );

        Ok(Self {
            backend,
            oracle: ReductionOracle::new(config.quantize_depth),
            validator: DifferentialValidator::new(config.quantize_depth),
            config,
            layout,
            arena,
            launch,
        })
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run `trial_count` trials; a failed trial does not stop the run.
    pub fn run(&self) -> Result<HarnessSummary> {
        let _span = perf_span!("harness_run", trials = self.config.trial_count);
        let trials = (0..self.config.trial_count)
            .map(|trial| self.run_trial(trial))
            .collect::<Result<Vec<_>>>()?;

        let summary = HarnessSummary::new(self.backend.name(), self.config.clone(), trials);
        tracing::info!(
            trials = summary.trials.len(),
            failed = summary.failed_trials,
            race_events = summary.total_race_events,
            "harness finished"
        );
        Ok(summary)
    }

    /// Current contents of the emulated grid, as left by the last dispatch
    pub fn grid_snapshot(&self) -> Result<GridSnapshot> {
        Ok(self.shared_state()?.wide.grid().snapshot())
    }

    /// Seed used for `trial`'s input
    pub fn trial_seed(&self, trial: u32) -> u64 {
        self.config.seed.wrapping_add(trial as u64)
    }

    /// Generate fresh records for `trial` and run it
    pub fn run_trial(&self, trial: u32) -> Result<TrialReport> {
        let seed = self.trial_seed(trial);
        let mut rng = StdRng::seed_from_u64(seed);
        let records = generate_records(
            &mut rng,
            self.config.total_records(),
            self.config.grid_width,
            self.config.grid_height,
        );
        self.execute(trial, seed, &records)
    }

    /// Run a trial on caller-supplied records.
    ///
    /// `records` must hold `worker_count * iterations_per_worker` entries;
    /// worker `w` consumes the `w`-th run of `iterations_per_worker`.
    pub fn run_with_records(&self, trial: u32, records: &[InputRecord]) -> Result<TrialReport> {
        self.execute(trial, self.trial_seed(trial), records)
    }

    fn execute(&self, trial: u32, seed: u64, records: &[InputRecord]) -> Result<TrialReport> {
        let _span = perf_span!("trial", trial = trial, records = records.len());
        let start = Instant::now();

        let state = self.shared_state()?;
        let kernel = MaxCombineKernel::new(&self.config, records, state.wide, state.occupancy, state.tally)?;
        let locks = state.wide.locks();

        let before = locks.held_slots();
        if before > 0 {
            tracing::warn!(trial = trial, leaked_locks = before, "lock slots held before trial");
        }
        let mut leaked_locks = before;

        let mut metrics = DispatchMetrics {
            trial,
            workers: self.config.worker_count,
            iterations_per_worker: self.config.iterations_per_worker,
            ..Default::default()
        };

        metrics.reset_us = self.reset()?;
        let (stats, expected, oracle_us) = self.launch_with_oracle(&kernel, records)?;
        metrics.oracle_us = Some(oracle_us);
        leaked_locks = leaked_locks.max(locks.held_slots());

        let mut dispatches = Vec::with_capacity(self.config.dispatches_per_trial as usize);
        dispatches.push(self.validate(&state, &expected, stats, &mut metrics)?);

        for dispatch in 1..self.config.dispatches_per_trial {
            metrics.dispatch = dispatch;
            metrics.oracle_us = None;
            metrics.reset_us = self.reset()?;
            let stats = self.backend.dispatch(&kernel, &self.launch)?;
            leaked_locks = leaked_locks.max(locks.held_slots());
            dispatches.push(self.validate(&state, &expected, stats, &mut metrics)?);
        }

        perf_event!("leaked_locks", trial = trial, slots = leaked_locks, table_slots = locks.len());

        let report = TrialReport {
            trial,
            seed,
            records: records.len(),
            leaked_locks,
            passed: dispatches.iter().all(DispatchReport::passed),
            dispatches,
            duration_us: start.elapsed().as_micros() as u64,
        };

        TrialMetrics {
            trial,
            dispatches: report.dispatches.len() as u32,
            passed: report.passed,
            race_events: report.race_events(),
            mismatched_cells: report.mismatched_cells(),
            leaked_locks,
            duration: start.elapsed(),
        }
        .log();

        Ok(report)
    }

    fn shared_state(&self) -> Result<SharedState<'_>> {
        let locks = LockTable::new(self.arena.region(self.layout.locks)?)?;
        let grid = SharedGrid::new(
            self.arena.region(self.layout.grid)?,
            self.layout.width,
            self.layout.height,
            self.layout.row_stride,
        )?;
        Ok(SharedState {
            wide: WideAtomic::new(grid, locks, self.config.strategy),
            occupancy: OccupancyMap::new(self.arena.region(self.layout.occupancy)?),
            tally: ErrorTally::new(self.arena.region(self.layout.tally)?)?,
        })
    }

    /// Zero grid, occupancy and tally. The lock table is left alone.
    fn reset(&self) -> Result<u64> {
        let start = Instant::now();
        for region in self.layout.per_dispatch_regions() {
            self.arena.zero(region)?;
        }
        Ok(start.elapsed().as_micros() as u64)
    }

    /// Dispatch on a scoped thread while the oracle runs here.
    fn launch_with_oracle(
        &self,
        kernel: &MaxCombineKernel<'_>,
        records: &[InputRecord],
    ) -> Result<(DispatchStats, GridSnapshot, u64)> {
        let backend = &self.backend;
        let launch = &self.launch;

        std::thread::scope(|scope| -> Result<(DispatchStats, GridSnapshot, u64)> {
            let workload = scope.spawn(move || backend.dispatch(kernel, launch));
            let (expected, oracle_us) = timed_block!("oracle", {
                self.oracle
                    .compute(records, self.config.grid_width, self.config.grid_height)
            });
            let stats = workload.join().map_err(|_| Error::DispatchPanicked)??;
            Ok((stats, expected, oracle_us))
        })
    }

    fn validate(
        &self,
        state: &SharedState<'_>,
        expected: &GridSnapshot,
        stats: DispatchStats,
        metrics: &mut DispatchMetrics,
    ) -> Result<DispatchReport> {
        let _span = perf_span_threshold!(
            "validate",
            VALIDATE_SPAN_THRESHOLD_US,
            trial = metrics.trial,
            dispatch = metrics.dispatch
        );
        let start = Instant::now();
        let actual = state.wide.grid().snapshot();
        let comparison = self.validator.compare(&actual, expected)?;
        let tally = DifferentialValidator::tally_errors(&state.tally.snapshot());
        let race_events = tally.values().map(|&count| count as u64).sum();

        metrics.workload_us = stats.duration_us;
        metrics.validate_us = start.elapsed().as_micros() as u64;
        metrics.log();

        for (&class, &count) in &tally {
            perf_event!(
                "race_tally",
                trial = metrics.trial,
                dispatch = metrics.dispatch,
                class = class,
                count = count,
                strategy = self.config.strategy.as_str()
            );
        }

        if !comparison.is_exact() {
            tracing::warn!(
                trial = metrics.trial,
                dispatch = metrics.dispatch,
                color = comparison.deviation.color,
                depth = comparison.deviation.depth,
                mismatched_cells = comparison.mismatched_cells,
                "deviation from oracle"
            );
        }

        Ok(DispatchReport {
            dispatch: metrics.dispatch,
            comparison,
            races: DifferentialValidator::describe(&tally),
            race_events,
            workload_us: stats.duration_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wide_atomic::LockStrategy;
    use widelock_backends::CpuBackend;

    fn small_config() -> TrialConfig {
        TrialConfig {
            grid_width: 8,
            grid_height: 8,
            iterations_per_worker: 16,
            worker_count: 128,
            trial_count: 2,
            dispatches_per_trial: 2,
            lock_table_size_bits: 6,
            group_size: 16,
            ..TrialConfig::for_smoke()
        }
    }

    #[test]
    fn test_harness_rejects_invalid_config() {
        let backend = CpuBackend::with_threads(4).unwrap();
        let config = TrialConfig {
            trial_count: 0,
            ..small_config()
        };
        assert!(matches!(TrialHarness::new(backend, config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_run_produces_one_report_per_trial_and_dispatch() {
        let backend = CpuBackend::with_threads(4).unwrap();
        let harness = TrialHarness::new(backend, small_config()).unwrap();
        let summary = harness.run().unwrap();

        assert_eq!(summary.trials.len(), 2);
        assert!(summary.passed());
        assert_eq!(summary.total_race_events, 0);
        for (index, trial) in summary.trials.iter().enumerate() {
            assert_eq!(trial.trial, index as u32);
            assert_eq!(trial.records, 128 * 16);
            assert_eq!(trial.dispatches.len(), 2);
            assert_eq!(trial.leaked_locks, 0);
            assert!(trial.passed);
        }
    }

    #[test]
    fn test_trials_are_reproducible() {
        let backend = CpuBackend::with_threads(4).unwrap();
        let harness = TrialHarness::new(backend, small_config()).unwrap();
        assert_eq!(harness.trial_seed(3), small_config().seed + 3);

        let first = harness.run_trial(1).unwrap();
        let again = harness.run_trial(1).unwrap();
        assert_eq!(first.seed, again.seed);
        assert!(first.passed && again.passed);
    }

    #[test]
    fn test_record_count_must_match_geometry() {
        let backend = CpuBackend::with_threads(4).unwrap();
        let harness = TrialHarness::new(backend, small_config()).unwrap();
        let records = vec![InputRecord::new(0, 0, 0.5, 0.5); 5];
        assert!(matches!(
            harness.run_with_records(0, &records),
            Err(Error::RecordCountMismatch { .. })
        ));
    }

    #[test]
    fn test_summary_serializes() {
        let backend = CpuBackend::with_threads(4).unwrap();
        let config = TrialConfig {
            trial_count: 1,
            dispatches_per_trial: 1,
            strategy: LockStrategy::IndependentSpin,
            ..small_config()
        };
        let harness = TrialHarness::new(backend, config).unwrap();
        let json = harness.run().unwrap().to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["backend"], "cpu");
        assert_eq!(value["config"]["strategy"], "independent_spin");
        assert_eq!(value["failed_trials"], 0);
        assert_eq!(value["trials"][0]["dispatches"][0]["comparison"]["mismatched_cells"], 0);
    }
}
