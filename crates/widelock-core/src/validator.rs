//! Differential comparison of emulated and reference grids

use crate::error::{Error, Result};
use crate::grid::GridSnapshot;
use crate::pixel::DepthEncoding;
use crate::tally::RaceClass;
use serde::Serialize;
use std::collections::BTreeMap;

/// Summed absolute per-channel difference over all cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Deviation {
    pub color: f32,
    pub depth: f32,
}

impl Deviation {
    /// Exactly zero on both channels; no tolerance.
    pub fn is_zero(&self) -> bool {
        self.color == 0.0 && self.depth == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Comparison {
    pub deviation: Deviation,
    /// Cells whose packed values differ
    pub mismatched_cells: usize,
}

impl Comparison {
    pub fn is_exact(&self) -> bool {
        self.deviation.is_zero() && self.mismatched_cells == 0
    }
}

/// One nonzero tally entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaceCount {
    pub code: usize,
    /// Known class name, display only
    pub class: Option<&'static str>,
    pub count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DifferentialValidator {
    encoding: DepthEncoding,
}

impl DifferentialValidator {
    pub fn new(quantize_depth: bool) -> Self {
        Self {
            encoding: DepthEncoding::from_quantize_flag(quantize_depth),
        }
    }

    /// Compare `actual` against `expected`; depth is dequantized first.
    pub fn compare(&self, actual: &GridSnapshot, expected: &GridSnapshot) -> Result<Comparison> {
        if actual.width() != expected.width() || actual.height() != expected.height() {
            return Err(Error::GridSizeMismatch {
                expected: expected.cells().len(),
                actual: actual.cells().len(),
            });
        }

        let mut color = 0.0f64;
        let mut depth = 0.0f64;
        let mut mismatched_cells = 0;
        for (a, e) in actual.cells().iter().zip(expected.cells()) {
            if a == e {
                continue;
            }
            mismatched_cells += 1;
            color += f64::from((a.color() - e.color()).abs());
            depth += f64::from((a.depth(self.encoding) - e.depth(self.encoding)).abs());
        }

        Ok(Comparison {
            deviation: Deviation {
                color: color as f32,
                depth: depth as f32,
            },
            mismatched_cells,
        })
    }

    /// Nonzero counters of a tally buffer, keyed by class code
    pub fn tally_errors(counters: &[u32]) -> BTreeMap<usize, u32> {
        counters
            .iter()
            .enumerate()
            .filter(|(_, &count)| count != 0)
            .map(|(code, &count)| (code, count))
            .collect()
    }

    /// Attach known class names to a tally
    pub fn describe(tally: &BTreeMap<usize, u32>) -> Vec<RaceCount> {
        tally
            .iter()
            .map(|(&code, &count)| RaceCount {
                code,
                class: RaceClass::from_code(code).map(RaceClass::name),
                count,
            })
            .collect()
    }
}
