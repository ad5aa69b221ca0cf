//! Chunk decompression for the om compression schemes
//!
//! A chunk payload is one byte holding the stored bit width followed by the
//! bit-packed words for every element of the chunk. Decompression restores the
//! words into a reusable [`ChunkBuffer`]; the scale and float transforms are
//! applied while the words are copied into the destination cube.

use crate::codec::{self, KernelError, PackedWord};
use crate::types::{CompressionScheme, DataType, OmElement};
use bytemuck::Pod;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Reusable scratch space for one decoded chunk
///
/// Backed by 8-byte words so it can be viewed as any wire element type.
#[derive(Debug, Clone, Default)]
pub struct ChunkBuffer {
    words: Vec<u64>,
}

impl ChunkBuffer {
    /// Allocate at least `bytes` bytes, as reported by `OmDecoder::read_buffer_size`
    pub fn new(bytes: u64) -> Self {
        Self {
            words: vec![0; bytes.div_ceil(8) as usize],
        }
    }

    /// Capacity in bytes
    pub fn byte_len(&self) -> u64 {
        self.words.len() as u64 * 8
    }

    /// Grow to at least `bytes` bytes
    pub fn reserve_bytes(&mut self, bytes: u64) {
        let words = bytes.div_ceil(8) as usize;
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
    }

    /// First `count` elements viewed as `W`; panics if the buffer is undersized
    pub(crate) fn view_mut<W: Pod>(&mut self, count: usize) -> &mut [W] {
        let all: &mut [W] = bytemuck::cast_slice_mut(&mut self.words);
        &mut all[..count]
    }

    pub(crate) fn view<W: Pod>(&self, count: usize) -> &[W] {
        let all: &[W] = bytemuck::cast_slice(&self.words);
        &all[..count]
    }
}

/// Decoder for one compression scheme
pub trait ChunkDecompressor: Debug + Send + Sync {
    /// Scheme this decompressor handles
    fn scheme(&self) -> CompressionScheme;

    /// Restore `dim0 * dim1` wire words from `raw` into `scratch`
    ///
    /// `dim1` is the chunk's extent along the last axis. Returns the number of
    /// bytes of `raw` consumed.
    fn decompress(
        &self,
        raw: &[u8],
        dim0: usize,
        dim1: usize,
        scratch: &mut ChunkBuffer,
    ) -> Result<usize, KernelError>;
}

fn split_header(raw: &[u8]) -> Result<(u32, &[u8]), KernelError> {
    match raw.split_first() {
        Some((&width, packed)) => Ok((width as u32, packed)),
        None => Err(KernelError::Truncated {
            needed: 1,
            available: 0,
        }),
    }
}

/// Int16 scaled values, 2-D delta coded and zig-zag packed
#[derive(Debug)]
pub struct ScaledDeltaDecompressor {
    logarithmic: bool,
}

impl ChunkDecompressor for ScaledDeltaDecompressor {
    fn scheme(&self) -> CompressionScheme {
        if self.logarithmic {
            CompressionScheme::Int16ScaledDeltaLogarithmic
        } else {
            CompressionScheme::Int16ScaledDelta
        }
    }

    fn decompress(
        &self,
        raw: &[u8],
        dim0: usize,
        dim1: usize,
        scratch: &mut ChunkBuffer,
    ) -> Result<usize, KernelError> {
        let (width, packed) = split_header(raw)?;
        let words = scratch.view_mut::<u16>(dim0 * dim1);
        let used = codec::decode_bitpacked(packed, width, words)?;
        for word in words.iter_mut() {
            *word = codec::zigzag_decode(*word) as u16;
        }
        codec::delta2d_decode(bytemuck::cast_slice_mut::<u16, i16>(words), dim0, dim1);
        Ok(1 + used)
    }
}

/// Float bits, 2-D XOR coded and packed
#[derive(Debug)]
pub struct XorDecompressor<W> {
    _word: PhantomData<W>,
}

impl<W: PackedWord + Pod + Debug + Send + Sync> ChunkDecompressor for XorDecompressor<W> {
    fn scheme(&self) -> CompressionScheme {
        CompressionScheme::FloatXor
    }

    fn decompress(
        &self,
        raw: &[u8],
        dim0: usize,
        dim1: usize,
        scratch: &mut ChunkBuffer,
    ) -> Result<usize, KernelError> {
        let (width, packed) = split_header(raw)?;
        let words = scratch.view_mut::<W>(dim0 * dim1);
        let used = codec::decode_bitpacked(packed, width, words)?;
        codec::xor2d_decode(words, dim0, dim1);
        Ok(1 + used)
    }
}

static SCALED_DELTA: ScaledDeltaDecompressor = ScaledDeltaDecompressor { logarithmic: false };
static SCALED_DELTA_LOG: ScaledDeltaDecompressor = ScaledDeltaDecompressor { logarithmic: true };
static XOR_FLOAT: XorDecompressor<u32> = XorDecompressor { _word: PhantomData };
static XOR_DOUBLE: XorDecompressor<u64> = XorDecompressor { _word: PhantomData };

/// Get the decompressor for a scheme and logical data type
pub fn get_decompressor(
    scheme: CompressionScheme,
    data_type: DataType,
) -> Option<&'static dyn ChunkDecompressor> {
    match (scheme, data_type) {
        (CompressionScheme::Int16ScaledDelta, DataType::Float) => Some(&SCALED_DELTA),
        (CompressionScheme::Int16ScaledDeltaLogarithmic, DataType::Float) => {
            Some(&SCALED_DELTA_LOG)
        }
        (CompressionScheme::FloatXor, DataType::Float) => Some(&XOR_FLOAT),
        (CompressionScheme::FloatXor, DataType::Double) => Some(&XOR_DOUBLE),
        _ => None,
    }
}

/// Dequantize int16 words; `i16::MAX` marks a missing value
pub(crate) fn dequantize<T: OmElement>(src: &[i16], dst: &mut [T], scalefactor: f32, logarithmic: bool) {
    for (out, &value) in dst.iter_mut().zip(src) {
        *out = if value == i16::MAX {
            T::nan()
        } else {
            let scaled = value as f32 / scalefactor;
            T::from_f32(if logarithmic { scaled.exp_m1() } else { scaled })
        };
    }
}

/// Reinterpret restored float words
pub(crate) fn from_wire<W: PackedWord, T: OmElement>(src: &[W], dst: &mut [T]) {
    for (out, &bits) in dst.iter_mut().zip(src) {
        *out = T::from_wire_bits(bits.to_u64());
    }
}
