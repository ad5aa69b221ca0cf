//! Core data types for om files

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical element types an om array may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    /// Signed 8-bit integer
    Int8 = 0,
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Signed 16-bit integer
    Int16 = 2,
    /// Unsigned 16-bit integer
    Uint16 = 3,
    /// Signed 32-bit integer
    Int32 = 4,
    /// Unsigned 32-bit integer
    Uint32 = 5,
    /// Signed 64-bit integer
    Int64 = 6,
    /// Unsigned 64-bit integer
    Uint64 = 7,
    /// 32-bit floating point
    Float = 8,
    /// 64-bit floating point
    Double = 9,
}

impl DataType {
    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Int8 | DataType::Uint8 => 1,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float => 4,
            DataType::Int64 | DataType::Uint64 | DataType::Double => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Compression schemes used for chunk payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CompressionScheme {
    /// Values scaled to int16, 2-D delta coded, zig-zag bit-packed (lossy)
    Int16ScaledDelta = 0,
    /// Float bits 2-D XOR coded and bit-packed (lossless)
    FloatXor = 1,
    /// Like `Int16ScaledDelta`, applied to `log1p` of the values (lossy)
    Int16ScaledDeltaLogarithmic = 3,
}

impl CompressionScheme {
    /// Whether the scheme quantizes through the scale factor
    pub fn is_lossy(&self) -> bool {
        !matches!(self, CompressionScheme::FloatXor)
    }
}

/// On-wire bytes per element for a scheme and logical data type
pub fn compression_bytes_per_element(scheme: CompressionScheme, data_type: DataType) -> usize {
    match scheme {
        CompressionScheme::Int16ScaledDelta | CompressionScheme::Int16ScaledDeltaLogarithmic => 2,
        CompressionScheme::FloatXor => data_type.size_in_bytes(),
    }
}

/// Rust element types a decoded cube can hold
pub trait OmElement: num_traits::Float + Copy + Send + Sync + 'static {
    /// Logical data type this element represents
    const DATA_TYPE: DataType;

    /// Convert a dequantized single-precision value
    fn from_f32(value: f32) -> Self;

    /// Reinterpret raw IEEE-754 bits of this type's width
    fn from_wire_bits(bits: u64) -> Self;
}

impl OmElement for f32 {
    const DATA_TYPE: DataType = DataType::Float;

    fn from_f32(value: f32) -> Self {
        value
    }

    fn from_wire_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl OmElement for f64 {
    const DATA_TYPE: DataType = DataType::Double;

    fn from_f32(value: f32) -> Self {
        value as f64
    }

    fn from_wire_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}
