//! Logging for widelock trial runs.
//!
//! A trial run produces three kinds of output: one `info!` line per trial
//! and per harness run, `warn!` lines for oracle deviations and leaked lock
//! slots, and `debug!` timing events from [`performance`]. The presets below
//! pick which of those reach the terminal and in what shape.
//!
//! ```rust,no_run
//! use widelock_tracing::{init_global_tracing, Preset, TracingConfig};
//!
//! # fn main() -> Result<(), widelock_tracing::TracingSetupError> {
//! init_global_tracing(&TracingConfig::preset(Preset::Ci))?;
//! # Ok(())
//! # }
//! ```

pub mod performance;

#[macro_use]
pub mod macros;

use std::env;
use std::str::FromStr;

pub use tracing;
pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Filter used when neither the config nor `RUST_LOG` supplies one
const FALLBACK_DIRECTIVE: &str = "warn,widelock_core=info";

/// Named starting points for [`TracingConfig`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preset {
    /// One compact line per trial, coloured
    #[default]
    Local,
    /// JSON lines, trial outcomes only
    Ci,
    /// JSON lines with every phase timing and span close
    Performance,
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ci" => Ok(Self::Ci),
            "performance" | "perf" => Ok(Self::Performance),
            other => Err(format!("unknown tracing preset '{other}'")),
        }
    }
}

/// Output shape of the formatter layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl FromStr for TracingOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown tracing format '{other}'")),
        }
    }
}

/// Subscriber settings for a trial run
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// `EnvFilter` directives; `None` defers to `RUST_LOG`
    pub directives: Option<String>,
    pub output: TracingOutput,
    /// Show module paths; off for the compact local view
    pub include_targets: bool,
    pub ansi: bool,
    pub span_events: FmtSpan,
    /// Whether [`performance::PerformanceSpan`]s report on drop
    pub enable_performance_tracing: bool,
    /// Global floor for reported span durations
    pub performance_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::preset(Preset::Local)
    }
}

impl TracingConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Local => Self::for_local(),
            Preset::Ci => Self::for_ci(),
            Preset::Performance => Self::for_performance(),
        }
    }

    /// Trial summaries on a terminal, without phase timings.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            output: TracingOutput::Compact,
            include_targets: false,
            ansi: true,
            span_events: FmtSpan::NONE,
            enable_performance_tracing: false,
            performance_threshold_us: None,
        }
    }

    /// Machine-readable trial outcomes and warnings.
    pub fn for_ci() -> Self {
        Self {
            directives: Some(FALLBACK_DIRECTIVE.to_string()),
            output: TracingOutput::Json,
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            enable_performance_tracing: false,
            performance_threshold_us: None,
        }
    }

    /// Every reset, dispatch, oracle and validate timing. Spans under
    /// 50µs are dropped.
    pub fn for_performance() -> Self {
        Self {
            directives: Some("warn,widelock_core=debug,widelock_backends=debug,widelock_tracing=debug".to_string()),
            output: TracingOutput::Json,
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::CLOSE,
            enable_performance_tracing: true,
            performance_threshold_us: Some(50),
        }
    }

    /// Preset from `WIDELOCK_TRACING_PROFILE`, then per-field overrides:
    ///
    /// | variable                      | effect                              |
    /// |-------------------------------|-------------------------------------|
    /// | `WIDELOCK_TRACING_DIRECTIVES` | replaces the filter                 |
    /// | `WIDELOCK_TRACING_FORMAT`     | `compact`, `pretty` or `json`       |
    /// | `WIDELOCK_PERF_TRACING`       | `1`/`true`/`yes` enables span events |
    /// | `WIDELOCK_PERF_THRESHOLD_US`  | minimum reported span duration      |
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let preset = env_value::<Preset>("WIDELOCK_TRACING_PROFILE").unwrap_or_default();
        let mut config = Self::preset(preset);

        if let Some(directives) = env::var("WIDELOCK_TRACING_DIRECTIVES")
            .ok()
            .filter(|d| !d.trim().is_empty())
        {
            config.directives = Some(directives);
        }
        if let Some(output) = env_value::<TracingOutput>("WIDELOCK_TRACING_FORMAT") {
            config.output = output;
            config.ansi &= output != TracingOutput::Json;
        }
        if let Ok(flag) = env::var("WIDELOCK_PERF_TRACING") {
            config.enable_performance_tracing = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(threshold_us) = env_value::<u64>("WIDELOCK_PERF_THRESHOLD_US") {
            config.performance_threshold_us = Some(threshold_us);
        }

        config
    }

    fn filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE))),
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}

/// Failures while installing the subscriber
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Subscriber for `config`, not yet installed
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let (filter, layer) = subscriber_layers(config)?;
    Ok(Registry::default().with(layer).with(filter))
}

/// Filter and formatter separately, for callers adding their own layers
pub fn subscriber_layers(config: &TracingConfig) -> Result<(EnvFilter, BoxedLayer), TracingSetupError> {
    let base = tracing_fmt::layer()
        .with_target(config.include_targets)
        .with_span_events(config.span_events.clone());

    let layer: BoxedLayer = match config.output {
        TracingOutput::Compact => Box::new(base.compact().with_ansi(config.ansi)),
        TracingOutput::Pretty => Box::new(base.pretty().with_ansi(config.ansi)),
        TracingOutput::Json => Box::new(base.json().with_ansi(false)),
    };

    Ok((config.filter()?, layer))
}

/// Apply the performance settings and install the subscriber globally.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    performance::configure(config.enable_performance_tracing, config.performance_threshold_us);
    build_subscriber(config)?.try_init()?;
    Ok(())
}

/// Environment-driven setup for test binaries; a second call is a no-op.
pub fn init_for_tests() {
    let config = TracingConfig {
        ansi: false,
        ..TracingConfig::from_env()
    };
    let _ = init_global_tracing(&config);
}
