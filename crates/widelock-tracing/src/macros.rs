//! Instrumentation macros built on [`crate::performance`].

/// Start a [`crate::performance::PerformanceSpan`], optionally carrying fields.
///
/// ```rust
/// use widelock_tracing::perf_span;
///
/// {
///     let _span = perf_span!("group_fetch_max", lanes = 32);
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = $crate::tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name, None)
    }};
}

/// Emit a debug-level metric event.
///
/// ```rust
/// use widelock_tracing::perf_event;
///
/// perf_event!("leaked_locks", slots = 0);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        $crate::tracing::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}

/// Time a block, yielding `(result, duration_us)`.
///
/// ```rust
/// use widelock_tracing::timed_block;
///
/// let (sum, _us) = timed_block!("sum", { (1..=10).sum::<u32>() });
/// assert_eq!(sum, 55);
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        $crate::tracing::debug!(
            operation = $name,
            duration_us = duration_us,
            duration_ms = duration_us as f64 / 1000.0,
            "timed_block_complete"
        );
        (result, duration_us)
    }};
}

/// Like [`perf_span!`], but only reports spans lasting at least
/// `threshold_us` microseconds.
#[macro_export]
macro_rules! perf_span_threshold {
    ($name:expr, $threshold_us:expr) => {{
        $crate::performance::PerformanceSpan::new($name, Some($threshold_us))
    }};
    ($name:expr, $threshold_us:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = $crate::tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name, Some($threshold_us))
    }};
}
