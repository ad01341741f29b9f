//! Performance spans and structured metric events.
//!
//! Spans are RAII guards: they time from construction to drop and emit a
//! single `performance_span_complete` event, subject to the process-wide
//! enable flag and an optional per-span threshold.
//!
//! ```rust
//! use widelock_tracing::performance::{record_dispatch, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("oracle_compute", Some(100));
//! drop(span);
//!
//! record_dispatch(1024, 64, 2_000);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::Level;

static PERF_ENABLED: AtomicBool = AtomicBool::new(true);
// u64::MAX encodes "no global threshold".
static PERF_THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// Set the process-wide performance span behaviour.
pub fn configure(enabled: bool, threshold_us: Option<u64>) {
    PERF_ENABLED.store(enabled, Ordering::Relaxed);
    PERF_THRESHOLD_US.store(threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

/// Whether performance spans currently emit events.
pub fn is_enabled() -> bool {
    PERF_ENABLED.load(Ordering::Relaxed)
}

fn global_threshold() -> Option<u64> {
    match PERF_THRESHOLD_US.load(Ordering::Relaxed) {
        u64::MAX => None,
        value => Some(value),
    }
}

/// Timing guard that logs its duration on drop.
///
/// A span only reports when performance tracing is enabled and its
/// duration reaches both its own threshold and the global one.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Start a debug-level span; `threshold_us` of `None` always reports.
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    fn with_level(level: Level, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %name),
            Level::DEBUG => tracing::debug_span!("perf", name = %name),
            Level::INFO => tracing::info_span!("perf", name = %name),
            Level::WARN => tracing::warn_span!("perf", name = %name),
            Level::ERROR => tracing::error_span!("perf", name = %name),
        };

        Self {
            name,
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Microseconds since the span started.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    fn should_report(&self, elapsed_us: u64) -> bool {
        is_enabled()
            && self.threshold_us.is_none_or(|t| elapsed_us >= t)
            && global_threshold().is_none_or(|t| elapsed_us >= t)
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.should_report(elapsed_us) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Arena allocation on a backend.
pub fn record_allocation(words: usize, alignment_words: usize, duration_us: u64) {
    tracing::debug!(
        event = "allocation",
        words = words,
        size_bytes = words * 4,
        alignment_words = alignment_words,
        duration_us = duration_us,
        "arena_allocation"
    );
}

/// A completed workload dispatch with its wide-atomic update rate.
pub fn record_dispatch(workers: usize, iterations_per_worker: usize, duration_us: u64) {
    let updates = workers as f64 * iterations_per_worker as f64;
    let updates_per_sec = if duration_us > 0 {
        updates / duration_us as f64 * 1_000_000.0
    } else {
        0.0
    };

    tracing::debug!(
        event = "dispatch",
        workers = workers,
        iterations_per_worker = iterations_per_worker,
        duration_us = duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        updates_per_sec = updates_per_sec,
        mupdates_per_sec = updates_per_sec / 1_000_000.0,
        "workload_dispatch"
    );
}

/// End-of-trial outcome.
pub fn record_trial(trial: usize, passed: bool, race_events: u64, duration_us: u64) {
    tracing::debug!(
        event = "trial",
        trial = trial,
        passed = passed,
        race_events = race_events,
        duration_us = duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        "trial_complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn span_keeps_name_and_threshold() {
        let span = PerformanceSpan::new("lock_acquire", Some(1000));
        assert_eq!(span.name(), "lock_acquire");
        assert_eq!(span.threshold_us, Some(1000));
    }

    #[test]
    fn span_measures_elapsed_time() {
        let span = PerformanceSpan::new("sleepy", None);
        thread::sleep(Duration::from_millis(5));
        assert!(span.elapsed_us() >= 5_000);
    }

    #[test]
    fn threshold_suppresses_short_spans() {
        let span = PerformanceSpan::with_level(Level::INFO, "short", Some(u64::MAX - 1));
        assert!(!span.should_report(10));
    }

    #[test]
    fn metric_events_do_not_panic() {
        record_allocation(4096, 16, 12);
        record_dispatch(256, 1024, 0);
        record_dispatch(256, 1024, 500);
        record_trial(3, true, 0, 1500);
    }
}
