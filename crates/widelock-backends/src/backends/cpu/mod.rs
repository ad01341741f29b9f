//! CPU backend
//!
//! Reference implementation of [`Backend`] on a dedicated rayon pool.
//!
//! # Architecture
//!
//! ```text
//! CpuBackend
//! ├── AllocationLedger - zeroed arenas + allocation stats
//! └── CpuExecutor      - one rayon task per lock-step group
//! ```
//!
//! # Usage
//!
//! ```rust
//! use widelock_backends::{Backend, CpuBackend, GroupContext, Kernel, LaunchConfig};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct CountLanes(AtomicU64);
//!
//! impl Kernel for CountLanes {
//!     fn name(&self) -> &str {
//!         "count_lanes"
//!     }
//!
//!     fn execute_group(&self, group: &GroupContext) -> widelock_backends::Result<()> {
//!         self.0.fetch_add(group.active_lanes() as u64, Ordering::Relaxed);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = CpuBackend::new()?;
//! let kernel = CountLanes(AtomicU64::new(0));
//! backend.dispatch(&kernel, &LaunchConfig::linear(100, 32))?;
//! assert_eq!(kernel.0.load(Ordering::Relaxed), 100);
//! # Ok(())
//! # }
//! ```

mod executor_impl;
pub(crate) mod memory;

use crate::arena::Arena;
use crate::backend::{Backend, DispatchStats, Kernel, LaunchConfig};
use crate::error::{BackendError, Result};
use executor_impl::CpuExecutor;
use memory::AllocationLedger;
pub use memory::{AllocationStats, MAX_ARENA_WORDS};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use widelock_tracing::performance::record_allocation;

/// Lower bound on pool threads, so groups interleave even on small machines
pub const MIN_WORKER_THREADS: usize = 4;

/// Largest lock-step group
pub const MAX_GROUP_SIZE: u32 = 64;

/// Grid rows are padded to a multiple of this many cells (one 64-byte line)
pub const ROW_ALIGNMENT_CELLS: u32 = 8;

/// Arena regions start on 64-byte boundaries
pub const ARENA_ALIGNMENT_WORDS: usize = 16;

/// CPU backend running groups on its own rayon pool
#[derive(Clone)]
pub struct CpuBackend {
    executor: Arc<CpuExecutor>,
    ledger: Arc<Mutex<AllocationLedger>>,
    threads: usize,
}

impl CpuBackend {
    /// Backend with one thread per available core, and at least
    /// [`MIN_WORKER_THREADS`]
    pub fn new() -> Result<Self> {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::with_threads(cores)
    }

    /// Backend with `threads` pool threads, raised to [`MIN_WORKER_THREADS`]
    pub fn with_threads(threads: usize) -> Result<Self> {
        let threads = threads.max(MIN_WORKER_THREADS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("widelock-worker-{index}"))
            .build()
            .map_err(|err| BackendError::ThreadPool(err.to_string()))?;

        tracing::debug!(threads = threads, "cpu backend ready");

        Ok(Self {
            executor: Arc::new(CpuExecutor::new(Arc::new(pool), MAX_GROUP_SIZE)),
            ledger: Arc::new(Mutex::new(AllocationLedger::new())),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn allocation_stats(&self) -> AllocationStats {
        self.ledger.lock().stats()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn max_group_size(&self) -> u32 {
        MAX_GROUP_SIZE
    }

    fn allocate_arena(&self, words: usize) -> Result<Arena> {
        let start = Instant::now();
        let arena = self.ledger.lock().allocate(words)?;
        record_allocation(words, ARENA_ALIGNMENT_WORDS, start.elapsed().as_micros() as u64);
        Ok(arena)
    }

    fn arena_alignment_words(&self) -> usize {
        ARENA_ALIGNMENT_WORDS
    }

    fn row_stride(&self, width: u32) -> u32 {
        width.div_ceil(ROW_ALIGNMENT_CELLS) * ROW_ALIGNMENT_CELLS
    }

    fn dispatch(&self, kernel: &dyn Kernel, config: &LaunchConfig) -> Result<DispatchStats> {
        self.executor.execute(kernel, config)
    }
}
