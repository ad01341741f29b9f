//! Shared output grid and host-side snapshots
//!
//! Cell `i` (`i = y * row_stride + x`) owns words `2i` (color bits) and
//! `2i + 1` (depth bits) of the grid region, so its byte address is `8i`.

use crate::error::{Error, Result};
use crate::pixel::PackedPixel;
use std::sync::atomic::{AtomicU32, Ordering};

/// Bytes per cell: two 32-bit halves
pub const CELL_BYTES: u64 = 8;

/// Byte address of a cell within the grid region, the lock-table hash key
#[inline]
pub fn cell_address(cell: usize) -> u64 {
    cell as u64 * CELL_BYTES
}

/// Atomic view of the grid region
#[derive(Debug, Clone, Copy)]
pub struct SharedGrid<'a> {
    words: &'a [AtomicU32],
    width: u32,
    height: u32,
    row_stride: u32,
}

impl<'a> SharedGrid<'a> {
    pub fn new(words: &'a [AtomicU32], width: u32, height: u32, row_stride: u32) -> Result<Self> {
        if row_stride < width {
            return Err(Error::invalid_config(format!(
                "row stride {row_stride} is narrower than grid width {width}"
            )));
        }
        let needed = 2 * row_stride as usize * height as usize;
        if words.len() < needed {
            return Err(Error::GridSizeMismatch {
                expected: needed,
                actual: words.len(),
            });
        }
        Ok(Self {
            words,
            width,
            height,
            row_stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_stride(&self) -> u32 {
        self.row_stride
    }

    #[inline]
    pub fn cell_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.row_stride as usize + x as usize
    }

    /// `(color_bits, depth_bits)`, each read relaxed
    #[inline]
    pub fn load_halves(&self, cell: usize) -> (u32, u32) {
        let low = self.words[2 * cell].load(Ordering::Relaxed);
        let high = self.words[2 * cell + 1].load(Ordering::Relaxed);
        (low, high)
    }

    #[inline]
    pub fn store_halves(&self, cell: usize, low: u32, high: u32) {
        self.words[2 * cell].store(low, Ordering::Relaxed);
        self.words[2 * cell + 1].store(high, Ordering::Relaxed);
    }

    /// Unsynchronized two-word read; may tear while writers are active.
    #[inline]
    pub fn load(&self, cell: usize) -> PackedPixel {
        let (low, high) = self.load_halves(cell);
        PackedPixel::from_halves(low, high)
    }

    #[inline]
    pub fn store(&self, cell: usize, value: PackedPixel) {
        self.store_halves(cell, value.color_bits(), value.depth_bits());
    }

    /// Copy of the visible cells, row padding dropped
    pub fn snapshot(&self) -> GridSnapshot {
        let mut cells = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                cells.push(self.load(self.cell_index(x, y)));
            }
        }
        GridSnapshot {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

/// Dense row-major grid of packed pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    width: u32,
    height: u32,
    cells: Vec<PackedPixel>,
}

impl GridSnapshot {
    /// All-zero grid
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![PackedPixel::ZERO; width as usize * height as usize],
        }
    }

    pub fn from_cells(width: u32, height: u32, cells: Vec<PackedPixel>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(Error::GridSizeMismatch {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { width, height, cells })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[PackedPixel] {
        &self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> PackedPixel {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    pub fn cell_mut(&mut self, x: u32, y: u32) -> &mut PackedPixel {
        &mut self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Row-major `(color_bits, depth_bits)` little-endian pairs with rows
    /// padded to `row_stride` cells.
    pub fn to_le_bytes(&self, row_stride: u32) -> Vec<u8> {
        let stride = row_stride.max(self.width) as usize;
        let mut bytes = vec![0u8; stride * self.height as usize * CELL_BYTES as usize];
        for y in 0..self.height {
            for x in 0..self.width {
                let pixel = self.get(x, y);
                let offset = (y as usize * stride + x as usize) * CELL_BYTES as usize;
                bytes[offset..offset + 4].copy_from_slice(&pixel.color_bits().to_le_bytes());
                bytes[offset + 4..offset + 8].copy_from_slice(&pixel.depth_bits().to_le_bytes());
            }
        }
        bytes
    }
}
