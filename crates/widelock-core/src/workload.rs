//! Instrumented max-combine workload
//!
//! Worker `w` consumes records `w * iterations .. (w + 1) * iterations`, one
//! per iteration. Every iteration its group issues one
//! [`WideAtomic::group_rmw`] that max-combines each lane's packed pixel into
//! its cell, then re-reads those cells under their locks. The kernel
//! tallies the races it can observe from inside:
//!
//! - [`RaceClass::OverlappingCriticalSection`]: the cell's occupancy counter
//!   was already non-zero on entry
//! - [`RaceClass::StoreVerifyRetry`]: rewrites reported by the verify loop
//! - [`RaceClass::RegressedValue`]: the re-read found less than was written
//! - [`RaceClass::ReleaseWithoutHold`]: a release found its slot free

use crate::config::TrialConfig;
use crate::error::{Error, Result};
use crate::pixel::DepthEncoding;
use crate::record::InputRecord;
use crate::tally::{ErrorTally, RaceClass};
use crate::wide_atomic::{CriticalSection, RmwOutcome, WideAtomic};
use std::sync::atomic::{AtomicU32, Ordering};
use widelock_backends::{BackendError, GroupContext, Kernel};

/// Per-cell count of workers currently inside the cell's critical section
#[derive(Debug, Clone, Copy)]
pub struct OccupancyMap<'a> {
    counters: &'a [AtomicU32],
}

impl<'a> OccupancyMap<'a> {
    pub fn new(counters: &'a [AtomicU32]) -> Self {
        Self { counters }
    }

    /// Mark `cell` entered. Returns `true` if another worker was inside.
    #[inline]
    pub fn enter(&self, cell: usize) -> bool {
        self.counters[cell].fetch_add(1, Ordering::Relaxed) != 0
    }

    #[inline]
    pub fn exit(&self, cell: usize) {
        self.counters[cell].fetch_sub(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Cells with a worker inside; zero once a dispatch has finished
    pub fn occupied_cells(&self) -> usize {
        self.counters
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) != 0)
            .count()
    }
}

/// The kernel dispatched once per trial dispatch
pub struct MaxCombineKernel<'a> {
    records: &'a [InputRecord],
    worker_count: u64,
    iterations_per_worker: u32,
    encoding: DepthEncoding,
    dwell: u32,
    wide: WideAtomic<'a>,
    occupancy: OccupancyMap<'a>,
    tally: ErrorTally<'a>,
}

impl<'a> MaxCombineKernel<'a> {
    pub fn new(
        config: &TrialConfig,
        records: &'a [InputRecord],
        wide: WideAtomic<'a>,
        occupancy: OccupancyMap<'a>,
        tally: ErrorTally<'a>,
    ) -> Result<Self> {
        if records.len() != config.total_records() {
            return Err(Error::RecordCountMismatch {
                expected: config.total_records(),
                actual: records.len(),
            });
        }

        let grid = wide.grid();
        let padded_cells = grid.row_stride() as usize * grid.height() as usize;
        if occupancy.len() < padded_cells {
            return Err(Error::GridSizeMismatch {
                expected: padded_cells,
                actual: occupancy.len(),
            });
        }

        Ok(Self {
            records,
            worker_count: config.worker_count as u64,
            iterations_per_worker: config.iterations_per_worker,
            encoding: DepthEncoding::from_quantize_flag(config.quantize_depth),
            dwell: config.critical_section_dwell,
            wide,
            occupancy,
            tally,
        })
    }

    #[inline]
    fn record_index(&self, worker: u64, iteration: u32) -> usize {
        (worker * self.iterations_per_worker as u64 + iteration as u64) as usize
    }
}

impl Kernel for MaxCombineKernel<'_> {
    fn name(&self) -> &str {
        "max_combine"
    }

    fn execute_group(&self, group: &GroupContext) -> widelock_backends::Result<()> {
        let workers: Vec<u64> = group.lane_ids().collect();
        if let Some(&last) = workers.last() {
            if last >= self.worker_count {
                return Err(BackendError::kernel_failure(
                    self.name(),
                    group.group_index,
                    format!("lane {last} has no records ({} workers)", self.worker_count),
                ));
            }
        }

        let grid = self.wide.grid();
        let lanes = workers.len();
        let mut cells = Vec::with_capacity(lanes);
        let mut values = Vec::with_capacity(lanes);
        let mut written = vec![0u64; lanes];
        let mut observed = Vec::with_capacity(lanes);

        for iteration in 0..self.iterations_per_worker {
            cells.clear();
            values.clear();
            for &worker in &workers {
                let record = &self.records[self.record_index(worker, iteration)];
                let (x, y) = record.cell(grid.width(), grid.height());
                cells.push(grid.cell_index(x, y));
                values.push(record.pack(self.encoding).as_u64());
            }

            let mut section = InstrumentedMax {
                values: &values,
                written: &mut written,
                occupancy: self.occupancy,
                tally: self.tally,
                dwell: self.dwell,
            };
            let stats = self.wide.group_rmw(&cells, &mut section);
            self.tally.record_n(RaceClass::StoreVerifyRetry, stats.verify_retries);
            self.tally.record_n(RaceClass::ReleaseWithoutHold, stats.release_violations);

            self.wide.group_load(&cells, &mut observed);
            for (now, wrote) in observed.iter().zip(&written) {
                if now < wrote {
                    self.tally.record(RaceClass::RegressedValue);
                }
            }
        }

        Ok(())
    }
}

struct InstrumentedMax<'k> {
    values: &'k [u64],
    written: &'k mut [u64],
    occupancy: OccupancyMap<'k>,
    tally: ErrorTally<'k>,
    dwell: u32,
}

impl CriticalSection for InstrumentedMax<'_> {
    fn update(&mut self, lane: usize, cell: usize, current: u64) -> u64 {
        if self.occupancy.enter(cell) {
            self.tally.record(RaceClass::OverlappingCriticalSection);
        }
        for _ in 0..self.dwell {
            std::hint::spin_loop();
        }
        current.max(self.values[lane])
    }

    fn finish(&mut self, lane: usize, cell: usize, outcome: &RmwOutcome) {
        self.written[lane] = outcome.written;
        self.occupancy.exit(cell);
    }
}
