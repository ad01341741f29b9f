//! Packed 64-bit pixel values
//!
//! A [`PackedPixel`] stores depth in the high word and the color's raw f32
//! bits in the low word. Comparing packed values as unsigned integers
//! therefore orders by depth first and by raw color bits second, which is
//! the max-combine rule.

use serde::Serialize;
use std::fmt;

/// Largest 24-bit fixed-point depth, `2^24 - 1`
pub const DEPTH_QUANT_MAX: u32 = (1 << 24) - 1;

/// Reinterpret an `f32` as its IEEE-754 bit pattern
#[inline]
pub fn float_to_bits(value: f32) -> u32 {
    value.to_bits()
}

/// Reinterpret an IEEE-754 bit pattern as an `f32`
#[inline]
pub fn bits_to_float(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Clamp to `[0, 1]`, mapping NaN and `-0.0` to `+0.0`.
///
/// The sign bit would otherwise make `-0.0` outrank every positive value
/// once its bits are compared as an integer.
#[inline]
pub fn sanitize_unit(value: f32) -> f32 {
    if value.is_nan() || value == 0.0 {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// `round(clamp(depth, 0, 1) * (2^24 - 1))`
#[inline]
pub fn quantize_depth(depth: f32) -> u32 {
    (f64::from(sanitize_unit(depth)) * f64::from(DEPTH_QUANT_MAX)).round() as u32
}

/// Inverse of [`quantize_depth`]
#[inline]
pub fn dequantize_depth(bits: u32) -> f32 {
    (f64::from(bits) / f64::from(DEPTH_QUANT_MAX)) as f32
}

/// How depth is stored in the high word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthEncoding {
    /// 24-bit fixed point
    Quantized,
    /// Raw bits of the clamped depth float
    RawBits,
}

impl DepthEncoding {
    pub fn from_quantize_flag(quantize_depth: bool) -> Self {
        if quantize_depth {
            Self::Quantized
        } else {
            Self::RawBits
        }
    }

    pub fn encode(self, depth: f32) -> u32 {
        match self {
            Self::Quantized => quantize_depth(depth),
            Self::RawBits => float_to_bits(sanitize_unit(depth)),
        }
    }

    pub fn decode(self, bits: u32) -> f32 {
        match self {
            Self::Quantized => dequantize_depth(bits),
            Self::RawBits => bits_to_float(bits),
        }
    }
}

/// `(depth_bits << 32) | color_bits`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackedPixel(u64);

impl PackedPixel {
    pub const ZERO: Self = Self(0);

    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn from_halves(color_bits: u32, depth_bits: u32) -> Self {
        Self(((depth_bits as u64) << 32) | color_bits as u64)
    }

    /// Pack a color and depth; the color keeps its exact bit pattern.
    pub fn pack(color: f32, depth: f32, encoding: DepthEncoding) -> Self {
        Self::from_halves(float_to_bits(color), encoding.encode(depth))
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn color_bits(self) -> u32 {
        self.0 as u32
    }

    pub const fn depth_bits(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn color(self) -> f32 {
        bits_to_float(self.color_bits())
    }

    pub fn depth(self, encoding: DepthEncoding) -> f32 {
        encoding.decode(self.depth_bits())
    }
}

impl fmt::Display for PackedPixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
