//! Rayon dispatch of lock-step groups

use crate::backend::{DispatchStats, GroupContext, Kernel, LaunchConfig};
use crate::error::{BackendError, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::Instant;
use widelock_tracing::perf_span;

/// Runs kernels on a dedicated rayon pool.
///
/// Each group is one rayon task: its lanes run in lock-step on whichever
/// worker picks the task up, and groups spread across the pool.
pub struct CpuExecutor {
    pool: Arc<ThreadPool>,
    max_group_size: u32,
}

impl CpuExecutor {
    pub fn new(pool: Arc<ThreadPool>, max_group_size: u32) -> Self {
        Self { pool, max_group_size }
    }

    pub fn execute(&self, kernel: &dyn Kernel, config: &LaunchConfig) -> Result<DispatchStats> {
        self.validate(config)?;

        let total_groups = config.total_groups();
        let _span = perf_span!(
            "cpu_dispatch",
            kernel = kernel.name(),
            groups = total_groups,
            lanes = config.active_lanes
        );

        let start = Instant::now();
        self.pool.install(|| {
            (0..total_groups).into_par_iter().try_for_each(|group_index| {
                let group = GroupContext::new(group_index, config);
                if group.active_lanes() == 0 {
                    return Ok(());
                }
                kernel.execute_group(&group)
            })
        })?;
        let duration_us = start.elapsed().as_micros() as u64;

        tracing::trace!(
            kernel = kernel.name(),
            groups = total_groups,
            duration_us = duration_us,
            "dispatch complete"
        );

        Ok(DispatchStats {
            groups: total_groups,
            lanes: config.active_lanes,
            duration_us,
        })
    }

    fn validate(&self, config: &LaunchConfig) -> Result<()> {
        let group_size = config.block.total_lanes();
        if group_size == 0 || config.total_groups() == 0 {
            return Err(BackendError::invalid_launch(format!("empty launch: {config}")));
        }
        if group_size > self.max_group_size {
            return Err(BackendError::invalid_launch(format!(
                "group size {group_size} exceeds maximum {}",
                self.max_group_size
            )));
        }
        if config.active_lanes == 0 || config.active_lanes > config.total_lanes() {
            return Err(BackendError::invalid_launch(format!(
                "{} active lanes do not fit {} lane slots",
                config.active_lanes,
                config.total_lanes()
            )));
        }
        Ok(())
    }
}
