//! Input records: generation and the 16-byte little-endian wire format

use crate::error::{Error, Result};
use crate::pixel::{bits_to_float, float_to_bits, sanitize_unit, DepthEncoding, PackedPixel};
use bytemuck::{Pod, Zeroable};
use rand::Rng;

/// Encoded size of one record
pub const RECORD_SIZE: usize = std::mem::size_of::<RawInputRecord>();

/// Wire image of a record: `x, y, color bits, depth bits`, each little-endian.
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct RawInputRecord {
    x: u32,
    y: u32,
    color_bits: u32,
    depth_bits: u32,
}

/// One write request against the shared grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputRecord {
    pub x: u32,
    pub y: u32,
    /// In `[0, 1]`
    pub color: f32,
    /// In `[0, 1]`
    pub depth: f32,
}

impl InputRecord {
    /// Build a record; color and depth are clamped to `[0, 1]` and NaN
    /// becomes 0.
    pub fn new(x: u32, y: u32, color: f32, depth: f32) -> Self {
        Self {
            x,
            y,
            color: sanitize_unit(color),
            depth: sanitize_unit(depth),
        }
    }

    /// Build a record from four random words: coordinates fold into the
    /// grid, color and depth are reinterpreted float bits.
    pub fn from_raw_bits(bits: [u32; 4], width: u32, height: u32) -> Self {
        Self::new(
            bits[0] % width.max(1),
            bits[1] % height.max(1),
            bits_to_float(bits[2]),
            bits_to_float(bits[3]),
        )
    }

    /// Target cell, with coordinates clamped into a `width` x `height` grid
    pub fn cell(&self, width: u32, height: u32) -> (u32, u32) {
        (
            self.x.min(width.saturating_sub(1)),
            self.y.min(height.saturating_sub(1)),
        )
    }

    pub fn pack(&self, encoding: DepthEncoding) -> PackedPixel {
        PackedPixel::pack(self.color, self.depth, encoding)
    }
}

/// Draw `count` records for a `width` x `height` grid
pub fn generate_records<R: Rng + ?Sized>(rng: &mut R, count: usize, width: u32, height: u32) -> Vec<InputRecord> {
    (0..count)
        .map(|_| InputRecord::from_raw_bits(rng.gen(), width, height))
        .collect()
}

/// Serialize records to the little-endian wire format
pub fn encode_records(records: &[InputRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(records.len() * RECORD_SIZE);
    for record in records {
        let raw = RawInputRecord {
            x: record.x.to_le(),
            y: record.y.to_le(),
            color_bits: float_to_bits(record.color).to_le(),
            depth_bits: float_to_bits(record.depth).to_le(),
        };
        bytes.extend_from_slice(bytemuck::bytes_of(&raw));
    }
    bytes
}

/// Parse the little-endian wire format.
///
/// Color and depth are sanitized the same way as [`InputRecord::new`].
pub fn decode_records(bytes: &[u8]) -> Result<Vec<InputRecord>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(Error::MalformedRecords {
            len: bytes.len(),
            record_size: RECORD_SIZE,
        });
    }

    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let raw: RawInputRecord = bytemuck::pod_read_unaligned(chunk);
            InputRecord::new(
                u32::from_le(raw.x),
                u32::from_le(raw.y),
                bits_to_float(u32::from_le(raw.color_bits)),
                bits_to_float(u32::from_le(raw.depth_bits)),
            )
        })
        .collect())
}
