//! Integer codec kernels: bit-packing, zig-zag, 2-D delta and 2-D XOR transforms
//!
//! Packed streams are LSB-first: value `i` occupies bits `i*w .. (i+1)*w` of the
//! byte stream read as one little-endian integer. A stream of `n` values at
//! width `w` is exactly `ceil(n*w/8)` bytes long.

use std::ops::BitXor;
use thiserror::Error;

/// Failure inside a codec kernel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("bit width {width} exceeds {max} for this element width")]
    BitWidth { width: u32, max: u32 },

    #[error("truncated payload: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// Unsigned words a packed stream can be unpacked into
pub trait PackedWord: Copy + Default + Eq + BitXor<Output = Self> {
    const BITS: u32;

    fn from_u64(value: u64) -> Self;

    fn to_u64(self) -> u64;
}

macro_rules! packed_word {
    ($($t:ty),*) => {
        $(
            impl PackedWord for $t {
                const BITS: u32 = <$t>::BITS;

                fn from_u64(value: u64) -> Self {
                    value as $t
                }

                fn to_u64(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

packed_word!(u16, u32, u64);

/// Bytes occupied by `count` values packed at `bit_width`
pub fn packed_len(count: usize, bit_width: u32) -> usize {
    (count * bit_width as usize).div_ceil(8)
}

/// Unpack `out.len()` values of `bit_width` bits from `bytes`
///
/// Returns the number of bytes consumed. Never reads outside `bytes`.
pub fn decode_bitpacked<W: PackedWord>(
    bytes: &[u8],
    bit_width: u32,
    out: &mut [W],
) -> Result<usize, KernelError> {
    if bit_width > W::BITS {
        return Err(KernelError::BitWidth {
            width: bit_width,
            max: W::BITS,
        });
    }
    let needed = packed_len(out.len(), bit_width);
    if needed > bytes.len() {
        return Err(KernelError::Truncated {
            needed,
            available: bytes.len(),
        });
    }

    if bit_width == 0 {
        out.fill(W::default());
        return Ok(0);
    }

    let mask = (1u128 << bit_width) - 1;
    let mut acc: u128 = 0;
    let mut acc_bits = 0u32;
    let mut pos = 0usize;
    for slot in out.iter_mut() {
        while acc_bits < bit_width {
            acc |= (bytes[pos] as u128) << acc_bits;
            pos += 1;
            acc_bits += 8;
        }
        *slot = W::from_u64((acc & mask) as u64);
        acc >>= bit_width;
        acc_bits -= bit_width;
    }
    Ok(needed)
}

/// Pack `values` at `bit_width` bits each, appending to `out`
///
/// Bits above `bit_width` are dropped; callers pick the width with
/// [`required_bit_width`].
pub fn encode_bitpacked<W: PackedWord>(values: &[W], bit_width: u32, out: &mut Vec<u8>) {
    if bit_width == 0 {
        return;
    }
    let mask = (1u128 << bit_width) - 1;
    let mut acc: u128 = 0;
    let mut acc_bits = 0u32;
    for value in values {
        acc |= (value.to_u64() as u128 & mask) << acc_bits;
        acc_bits += bit_width;
        while acc_bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if acc_bits > 0 {
        out.push(acc as u8);
    }
}

/// Smallest width able to hold every value
pub fn required_bit_width<W: PackedWord>(values: &[W]) -> u32 {
    let combined = values.iter().fold(0u64, |acc, v| acc | v.to_u64());
    64 - combined.leading_zeros()
}

pub fn zigzag_decode(value: u16) -> i16 {
    ((value >> 1) as i16) ^ -((value & 1) as i16)
}

pub fn zigzag_encode(value: i16) -> u16 {
    ((value << 1) ^ (value >> 15)) as u16
}

/// Undo a 2-D delta: each row of `dim1` values accumulates the row before it
pub fn delta2d_decode(buffer: &mut [i16], dim0: usize, dim1: usize) {
    debug_assert!(buffer.len() >= dim0 * dim1);
    for d0 in 1..dim0 {
        for d1 in 0..dim1 {
            let previous = buffer[(d0 - 1) * dim1 + d1];
            let current = &mut buffer[d0 * dim1 + d1];
            *current = current.wrapping_add(previous);
        }
    }
}

pub fn delta2d_encode(buffer: &mut [i16], dim0: usize, dim1: usize) {
    debug_assert!(buffer.len() >= dim0 * dim1);
    for d0 in (1..dim0).rev() {
        for d1 in 0..dim1 {
            let previous = buffer[(d0 - 1) * dim1 + d1];
            let current = &mut buffer[d0 * dim1 + d1];
            *current = current.wrapping_sub(previous);
        }
    }
}

/// Undo a 2-D XOR: each row of `dim1` words is XORed with the restored row before it
pub fn xor2d_decode<W: PackedWord>(buffer: &mut [W], dim0: usize, dim1: usize) {
    debug_assert!(buffer.len() >= dim0 * dim1);
    for d0 in 1..dim0 {
        for d1 in 0..dim1 {
            let previous = buffer[(d0 - 1) * dim1 + d1];
            let current = &mut buffer[d0 * dim1 + d1];
            *current = *current ^ previous;
        }
    }
}

pub fn xor2d_encode<W: PackedWord>(buffer: &mut [W], dim0: usize, dim1: usize) {
    debug_assert!(buffer.len() >= dim0 * dim1);
    for d0 in (1..dim0).rev() {
        for d1 in 0..dim1 {
            let previous = buffer[(d0 - 1) * dim1 + d1];
            let current = &mut buffer[d0 * dim1 + d1];
            *current = *current ^ previous;
        }
    }
}
