//! Chunk lookup table (LUT) layout and decoding
//!
//! The LUT holds one byte offset per chunk boundary and is itself stored in
//! fixed-size super-chunks. Super-chunk `k` covers chunks `[k*L, (k+1)*L)` and
//! carries the `L + 1` boundaries `k*L ..= (k+1)*L`, so the end of its last
//! chunk is known without touching the next super-chunk.

use crate::error::{OmError, Result};
use std::fmt::Debug;
use std::ops::Range;

/// Where the LUT lives and how it is split into super-chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutLayout {
    /// Byte offset of the first super-chunk
    pub start: u64,
    /// Chunk indices covered by one super-chunk
    pub chunk_length: u64,
    /// Offsets decoded from one super-chunk, `chunk_length + 1`
    pub chunk_element_count: u64,
}

impl LutLayout {
    pub fn new(start: u64, chunk_length: u64) -> Self {
        Self {
            start,
            chunk_length,
            chunk_element_count: chunk_length + 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_length == 0 {
            return Err(OmError::Configuration(
                "LUT chunk length must be positive".to_string(),
            ));
        }
        if self.chunk_element_count != self.chunk_length + 1 {
            return Err(OmError::Configuration(format!(
                "LUT chunk element count {} must be chunk length {} + 1",
                self.chunk_element_count, self.chunk_length
            )));
        }
        Ok(())
    }

    /// Super-chunk holding the offsets of `chunk`
    pub fn super_chunk_of(&self, chunk: u64) -> u64 {
        chunk / self.chunk_length
    }

    /// Super-chunks needed for `chunk_count` chunks
    pub fn super_chunk_count(&self, chunk_count: u64) -> u64 {
        chunk_count.div_ceil(self.chunk_length)
    }
}

/// Storage encoding of LUT super-chunks
pub trait LutCodec: Debug + Send + Sync {
    /// Bytes one stored super-chunk occupies
    fn stored_size(&self, layout: &LutLayout) -> u64;

    /// Decode one stored super-chunk into `layout.chunk_element_count` offsets
    fn decode_super_chunk(&self, bytes: &[u8], layout: &LutLayout, out: &mut [u64]) -> Result<()>;
}

/// Uncompressed LUT: little-endian `u64` offsets
#[derive(Debug, Default, Clone, Copy)]
pub struct RawLut;

impl LutCodec for RawLut {
    fn stored_size(&self, layout: &LutLayout) -> u64 {
        layout.chunk_element_count * 8
    }

    fn decode_super_chunk(&self, bytes: &[u8], layout: &LutLayout, out: &mut [u64]) -> Result<()> {
        let needed = self.stored_size(layout) as usize;
        if bytes.len() < needed || out.len() < layout.chunk_element_count as usize {
            return Err(OmError::CorruptLut(format!(
                "super-chunk needs {} bytes, got {}",
                needed,
                bytes.len()
            )));
        }
        for (slot, word) in out.iter_mut().zip(bytes[..needed].chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(word);
            *slot = u64::from_le_bytes(raw);
        }
        Ok(())
    }
}

/// Decoded chunk offsets for a contiguous range of chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOffsets {
    first_chunk: u64,
    /// `offsets[i]` is where chunk `first_chunk + i` starts
    offsets: Vec<u64>,
}

impl ChunkOffsets {
    /// Build from boundaries; `offsets.len()` is one more than the chunks covered
    pub fn new(first_chunk: u64, offsets: Vec<u64>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(OmError::CorruptLut("no offsets decoded".to_string()));
        }
        if let Some(pos) = offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(OmError::CorruptLut(format!(
                "offset of chunk {} decreases ({} -> {})",
                first_chunk + pos as u64 + 1,
                offsets[pos],
                offsets[pos + 1]
            )));
        }
        Ok(Self {
            first_chunk,
            offsets,
        })
    }

    /// Decode the super-chunks starting at `first_super_chunk` from `bytes`
    pub(crate) fn decode(
        codec: &dyn LutCodec,
        layout: &LutLayout,
        first_super_chunk: u64,
        bytes: &[u8],
    ) -> Result<Self> {
        let stored = codec.stored_size(layout) as usize;
        if stored == 0 || bytes.len() < stored {
            return Err(OmError::CorruptLut(format!(
                "need at least {} bytes for one super-chunk, got {}",
                stored,
                bytes.len()
            )));
        }

        let per_chunk = layout.chunk_element_count as usize;
        let mut scratch = vec![0u64; per_chunk];
        let mut offsets: Vec<u64> = Vec::with_capacity(bytes.len() / stored * per_chunk);
        for stored_chunk in bytes.chunks_exact(stored) {
            codec.decode_super_chunk(stored_chunk, layout, &mut scratch)?;
            match offsets.last() {
                None => offsets.extend_from_slice(&scratch),
                Some(&boundary) if boundary == scratch[0] => offsets.extend_from_slice(&scratch[1..]),
                Some(&boundary) => {
                    return Err(OmError::CorruptLut(format!(
                        "super-chunk boundary mismatch: {} != {}",
                        boundary, scratch[0]
                    )))
                }
            }
        }

        Self::new(first_super_chunk * layout.chunk_length, offsets)
    }

    /// Chunks whose start and end are known
    pub fn chunk_range(&self) -> Range<u64> {
        self.first_chunk..self.first_chunk + self.offsets.len() as u64 - 1
    }

    /// Byte range `[start, end)` of one chunk
    pub fn byte_range(&self, chunk: u64) -> Option<Range<u64>> {
        let i = chunk.checked_sub(self.first_chunk)? as usize;
        let start = *self.offsets.get(i)?;
        let end = *self.offsets.get(i + 1)?;
        Some(start..end)
    }

    /// Check that every chunk in `chunks` can be located
    pub fn covers(&self, chunks: &Range<u64>) -> bool {
        let known = self.chunk_range();
        chunks.is_empty() || (known.start <= chunks.start && chunks.end <= known.end)
    }
}
