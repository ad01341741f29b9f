//! Execution backends for widelock workloads
//!
//! This crate provides:
//! - **Arenas**: zeroed, bounds-checked blocks of `AtomicU32` words split
//!   into named regions
//! - **Backend Trait**: allocation, row layout and blocking dispatch
//! - **Kernel Trait**: per-group work run in lock-step
//! - **CPU Backend**: rayon-based reference implementation
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │   Kernel (per group) │
//!                 └──────────┬───────────┘
//!                            │ dispatch(kernel, LaunchConfig)
//!                            ▼
//!                 ┌──────────────────────┐
//!                 │    Backend trait     │
//!                 └──────────┬───────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!       ┌─────────────┐             ┌─────────────┐
//!       │ CpuExecutor │             │    Arena    │
//!       │   (rayon)   │             │ (AtomicU32) │
//!       └─────────────┘             └─────────────┘
//! ```
//!
//! Groups are the unit of scheduling: all lanes of one group run on the
//! same worker thread, and different groups run concurrently.

pub mod arena;
pub mod backend;
pub mod backends;
pub mod error;

pub use arena::{Arena, Region};
pub use backend::{Backend, BlockDim, DispatchStats, GridDim, GroupContext, Kernel, LaunchConfig};
pub use backends::cpu::{
    AllocationStats, ARENA_ALIGNMENT_WORDS, MAX_ARENA_WORDS, MAX_GROUP_SIZE, MIN_WORKER_THREADS,
    ROW_ALIGNMENT_CELLS,
};
pub use backends::CpuBackend;
pub use error::{BackendError, Result};
