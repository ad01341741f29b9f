//! Host-side reference result for the max-combine workload

use crate::grid::GridSnapshot;
use crate::pixel::DepthEncoding;
use crate::record::InputRecord;
use widelock_tracing::perf_span;

/// Sequential max-combine over the full record set.
///
/// Records are applied in input order and a cell is replaced only by a
/// strictly greater packed value, so equal values never overwrite.
#[derive(Debug, Clone, Copy)]
pub struct ReductionOracle {
    encoding: DepthEncoding,
}

impl ReductionOracle {
    pub fn new(quantize_depth: bool) -> Self {
        Self {
            encoding: DepthEncoding::from_quantize_flag(quantize_depth),
        }
    }

    pub fn encoding(&self) -> DepthEncoding {
        self.encoding
    }

    pub fn compute(&self, records: &[InputRecord], width: u32, height: u32) -> GridSnapshot {
        let _span = perf_span!("oracle_compute", records = records.len(), width = width, height = height);

        let mut grid = GridSnapshot::zeroed(width, height);
        if width == 0 || height == 0 {
            return grid;
        }

        for record in records {
            let (x, y) = record.cell(width, height);
            let packed = record.pack(self.encoding);
            let cell = grid.cell_mut(x, y);
            if packed > *cell {
                *cell = packed;
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PackedPixel;

    #[test]
    fn test_single_record() {
        let oracle = ReductionOracle::new(true);
        let grid = oracle.compute(&[InputRecord::new(0, 0, 0.2, 0.9)], 2, 2);

        assert_eq!(grid.get(0, 0), PackedPixel::pack(0.2, 0.9, DepthEncoding::Quantized));
        assert_eq!(grid.get(1, 0), PackedPixel::ZERO);
        assert_eq!(grid.get(0, 1), PackedPixel::ZERO);
        assert_eq!(grid.get(1, 1), PackedPixel::ZERO);
    }

    #[test]
    fn test_deeper_record_wins_in_any_order() {
        let oracle = ReductionOracle::new(true);
        let a = InputRecord::new(1, 1, 0.2, 0.9);
        let b = InputRecord::new(1, 1, 0.1, 0.95);

        let forward = oracle.compute(&[a, b], 2, 2);
        let backward = oracle.compute(&[b, a], 2, 2);
        assert_eq!(forward, backward);
        assert_eq!(forward.get(1, 1), b.pack(oracle.encoding()));
    }

    #[test]
    fn test_equal_depth_prefers_higher_color_bits() {
        let oracle = ReductionOracle::new(true);
        let grid = oracle.compute(
            &[InputRecord::new(0, 0, 0.7, 0.5), InputRecord::new(0, 0, 0.3, 0.5)],
            1,
            1,
        );
        assert_eq!(grid.get(0, 0).color(), 0.7);
    }

    #[test]
    fn test_raw_depth_mode() {
        let oracle = ReductionOracle::new(false);
        let grid = oracle.compute(&[InputRecord::new(0, 0, 0.5, 0.25)], 1, 1);
        assert_eq!(grid.get(0, 0).depth_bits(), 0.25f32.to_bits());
    }

    #[test]
    fn test_negative_zero_loses_in_raw_depth_mode() {
        let oracle = ReductionOracle::new(false);
        let deep = InputRecord::new(0, 0, 0.5, 1.0);
        let grid = oracle.compute(&[deep, InputRecord::new(0, 0, 0.5, -0.0)], 1, 1);
        assert_eq!(grid.get(0, 0), deep.pack(DepthEncoding::RawBits));

        let bright = InputRecord::new(0, 0, 1.0, 0.5);
        let grid = oracle.compute(&[bright, InputRecord::new(0, 0, -0.0, 0.5)], 1, 1);
        assert_eq!(grid.get(0, 0), bright.pack(DepthEncoding::RawBits));
    }

    #[test]
    fn test_zero_record_stays_zero() {
        let oracle = ReductionOracle::new(true);
        let grid = oracle.compute(&[InputRecord::new(0, 0, 0.0, 0.0)], 1, 1);
        assert_eq!(grid.get(0, 0), PackedPixel::ZERO);
        assert!(oracle.compute(&[], 0, 4).cells().is_empty());
    }
}
