//! Sub-allocation plan for the trial arena
//!
//! One arena holds every piece of shared state a dispatch touches. Regions
//! are laid out in order and each starts on the backend's alignment:
//!
//! ```text
//! | locks (2^bits) | grid (2 * stride * height) | occupancy (stride * height) | tally (64) |
//! ```

use crate::config::TrialConfig;
use crate::error::{Error, Result};
use crate::tally::ERROR_CLASS_COUNT;
use widelock_backends::{Backend, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaLayout {
    pub locks: Region,
    pub grid: Region,
    pub occupancy: Region,
    pub tally: Region,
    pub width: u32,
    pub height: u32,
    /// Row stride in cells
    pub row_stride: u32,
    /// Words the arena must hold
    pub total_words: usize,
}

impl ArenaLayout {
    /// Plan with the backend's row stride and alignment
    pub fn for_backend(config: &TrialConfig, backend: &dyn Backend) -> Result<Self> {
        Self::plan(
            config,
            backend.row_stride(config.grid_width),
            backend.arena_alignment_words(),
        )
    }

    pub fn plan(config: &TrialConfig, row_stride: u32, alignment_words: usize) -> Result<Self> {
        if row_stride < config.grid_width {
            return Err(Error::invalid_config(format!(
                "row stride {row_stride} is narrower than grid width {}",
                config.grid_width
            )));
        }
        if alignment_words == 0 {
            return Err(Error::invalid_config("arena alignment must be positive"));
        }

        let padded_cells = row_stride as usize * config.grid_height as usize;
        let sizes = [
            1usize << config.lock_table_size_bits,
            2 * padded_cells,
            padded_cells,
            ERROR_CLASS_COUNT,
        ];

        let mut regions = [Region::default(); 4];
        let mut cursor = 0;
        for (region, len) in regions.iter_mut().zip(sizes) {
            let offset = align_up(cursor, alignment_words);
            *region = Region::new(offset, len);
            cursor = offset + len;
        }
        let [locks, grid, occupancy, tally] = regions;

        Ok(Self {
            locks,
            grid,
            occupancy,
            tally,
            width: config.grid_width,
            height: config.grid_height,
            row_stride,
            total_words: cursor,
        })
    }

    /// Regions cleared before each dispatch
    pub fn per_dispatch_regions(&self) -> [Region; 3] {
        [self.grid, self.occupancy, self.tally]
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}
