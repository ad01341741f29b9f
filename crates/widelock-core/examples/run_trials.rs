//! Run randomized trials on the CPU backend and print the JSON summary.
//!
//! ```text
//! WIDELOCK_PROFILE=stress WIDELOCK_STRATEGY=unprotected cargo run --example run_trials
//! ```
//!
//! Exits with status 1 when any trial deviates from the oracle.

use widelock_backends::CpuBackend;
use widelock_core::{TrialConfig, TrialHarness};
use widelock_tracing::{init_global_tracing, TracingConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_global_tracing(&TracingConfig::from_env())?;

    let config = TrialConfig::from_env()?;
    let backend = CpuBackend::new()?;
    let harness = TrialHarness::new(backend, config)?;

    let summary = harness.run()?;
    println!("{}", summary.to_json()?);

    if !summary.passed() {
        std::process::exit(1);
    }
    Ok(())
}
