//! Structured metrics for trial phases
//!
//! Two levels:
//! 1. **Dispatch-level**: reset, workload, oracle and validation timings of
//!    one workload run
//! 2. **Trial-level**: outcome of all dispatches of a trial
//!
//! Both log through `tracing`; trial metrics also feed
//! [`widelock_tracing::performance::record_trial`].

use std::time::Duration;
use widelock_tracing::performance::{record_dispatch, record_trial};

// ============================================================================
// Dispatch-Level Metrics
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DispatchMetrics {
    pub trial: u32,
    pub dispatch: u32,
    pub workers: u32,
    pub iterations_per_worker: u32,
    pub reset_us: u64,
    pub workload_us: u64,
    /// Only the first dispatch of a trial overlaps the oracle
    pub oracle_us: Option<u64>,
    pub validate_us: u64,
}

impl DispatchMetrics {
    pub fn updates(&self) -> u64 {
        self.workers as u64 * self.iterations_per_worker as u64
    }

    /// Wide-atomic updates per second of workload time
    pub fn updates_per_second(&self) -> f64 {
        if self.workload_us == 0 {
            return 0.0;
        }
        self.updates() as f64 / self.workload_us as f64 * 1_000_000.0
    }

    pub fn log(&self) {
        record_dispatch(
            self.workers as usize,
            self.iterations_per_worker as usize,
            self.workload_us,
        );
        tracing::debug!(
            trial = self.trial,
            dispatch = self.dispatch,
            reset_us = self.reset_us,
            workload_us = self.workload_us,
            oracle_us = ?self.oracle_us,
            validate_us = self.validate_us,
            updates_per_second = self.updates_per_second(),
            "dispatch_phases"
        );
    }
}

// ============================================================================
// Trial-Level Metrics
// ============================================================================

#[derive(Debug, Clone)]
pub struct TrialMetrics {
    pub trial: u32,
    pub dispatches: u32,
    pub passed: bool,
    pub race_events: u64,
    pub mismatched_cells: usize,
    pub leaked_locks: usize,
    pub duration: Duration,
}

impl TrialMetrics {
    pub fn duration_us(&self) -> u64 {
        self.duration.as_micros() as u64
    }

    pub fn log(&self) {
        record_trial(self.trial as usize, self.passed, self.race_events, self.duration_us());
        if self.passed {
            tracing::info!(
                trial = self.trial,
                dispatches = self.dispatches,
                race_events = self.race_events,
                duration_ms = self.duration_us() as f64 / 1000.0,
                "trial passed"
            );
        } else {
            tracing::warn!(
                trial = self.trial,
                dispatches = self.dispatches,
                race_events = self.race_events,
                mismatched_cells = self.mismatched_cells,
                duration_ms = self.duration_us() as f64 / 1000.0,
                "trial failed: emulated grid deviates from oracle"
            );
        }
        if self.leaked_locks > 0 {
            tracing::warn!(trial = self.trial, leaked_locks = self.leaked_locks, "lock slots left held");
        }
    }
}
