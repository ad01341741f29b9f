//! Backend and kernel traits

use crate::arena::Arena;
use crate::backend::{DispatchStats, GroupContext, LaunchConfig};
use crate::error::Result;

/// Work run once per group of a dispatch.
///
/// A group executes its lanes in lock-step on one worker thread; distinct
/// groups may run concurrently. Kernels therefore see the shared arena only
/// through atomics.
pub trait Kernel: Sync {
    /// Name used in logs and error reports
    fn name(&self) -> &str;

    /// Run every active lane of `group`
    fn execute_group(&self, group: &GroupContext) -> Result<()>;
}

/// Execution facility for lock-step group workloads
///
/// A backend provides three things:
/// - zeroed, word-addressed shared arenas with a fixed alignment
/// - the row stride it lays grids out with
/// - a blocking `dispatch` that runs a kernel over a launch grid
pub trait Backend: Send + Sync {
    // ============================================================================================
    // Identification
    // ============================================================================================

    fn name(&self) -> &'static str;

    /// Largest group the backend runs in lock-step
    fn max_group_size(&self) -> u32;

    // ============================================================================================
    // Memory
    // ============================================================================================

    /// Allocate a zeroed arena of `words` 32-bit words
    fn allocate_arena(&self, words: usize) -> Result<Arena>;

    /// Region alignment inside arenas, in words
    fn arena_alignment_words(&self) -> usize;

    /// Row stride in cells for a grid `width` cells wide (always >= `width`)
    fn row_stride(&self, width: u32) -> u32;

    // ============================================================================================
    // Execution
    // ============================================================================================

    /// Run `kernel` over `config` and block until every group finished
    fn dispatch(&self, kernel: &dyn Kernel, config: &LaunchConfig) -> Result<DispatchStats>;
}
