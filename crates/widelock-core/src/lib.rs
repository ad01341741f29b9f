//! # widelock-core
//!
//! Emulated 64-bit atomics built from pairs of 32-bit words and a striped
//! lock table, checked by a differential max-combine harness.
//!
//! ## Components
//!
//! - [`LockTable`]: hashed 32-bit lock slots, CAS acquire / store release
//! - [`WideAtomic`]: load, store, fetch-add, compare-exchange and fetch-max
//!   on a cell's two halves under its slot, with three [`LockStrategy`]s
//! - [`ReductionOracle`]: sequential host recomputation of the expected grid
//! - [`DifferentialValidator`]: deviation sums, mismatched cells and the
//!   race-class tally
//! - [`TrialHarness`]: generate, reset, launch, oracle, validate, report
//!
//! ## Example
//!
//! ```rust,no_run
//! use widelock_backends::CpuBackend;
//! use widelock_core::{TrialConfig, TrialHarness};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let harness = TrialHarness::new(CpuBackend::new()?, TrialConfig::for_smoke())?;
//! let summary = harness.run()?;
//! assert!(summary.passed());
//! println!("{}", summary.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Packed layout
//!
//! A cell holds `(depth_bits << 32) | color_bits`. Comparing packed values
//! as `u64` orders by depth, then by raw color bits.

pub mod config;
pub mod error;
pub mod grid;
pub mod harness;
pub mod instrumentation;
pub mod layout;
pub mod lock_table;
pub mod oracle;
pub mod pixel;
pub mod record;
pub mod tally;
pub mod validator;
pub mod wide_atomic;
pub mod workload;

pub use config::TrialConfig;
pub use error::{Error, Result};
pub use grid::{cell_address, GridSnapshot, SharedGrid};
pub use harness::{DispatchReport, HarnessSummary, TrialHarness, TrialReport};
pub use layout::ArenaLayout;
pub use lock_table::LockTable;
pub use oracle::ReductionOracle;
pub use pixel::{
    bits_to_float, dequantize_depth, float_to_bits, quantize_depth, DepthEncoding, PackedPixel, DEPTH_QUANT_MAX,
};
pub use record::{decode_records, encode_records, generate_records, InputRecord, RECORD_SIZE};
pub use tally::{ErrorTally, RaceClass, ERROR_CLASS_COUNT};
pub use validator::{Comparison, Deviation, DifferentialValidator, RaceCount};
pub use wide_atomic::{CriticalSection, GroupStats, LockStrategy, RmwOutcome, WideAtomic};
pub use workload::{MaxCombineKernel, OccupancyMap};
