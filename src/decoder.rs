//! Decoder - plans LUT and data reads for a region and decodes chunks into a cube
//!
//! A decode session runs in two planning phases. Index reads fetch the LUT
//! super-chunks that locate the touched chunks; every index read then seeds
//! data reads over the chunk payloads it located:
//!
//! ```rust,ignore
//! let mut scratch = ChunkBuffer::new(decoder.read_buffer_size());
//! let mut index_read = decoder.index_read_init();
//! while decoder.next_index_read(&mut index_read) {
//!     let lut = fetch(index_read.offset, index_read.count)?;
//!     let offsets = decoder.decode_lut(&index_read, &lut)?;
//!     let mut data_read = decoder.data_read_init(&index_read);
//!     while decoder.next_data_read(&mut data_read, &offsets)? {
//!         let data = fetch(data_read.offset, data_read.count)?;
//!         decoder.decode_chunks(&data_read, &offsets, &data, &mut cube, &mut scratch)?;
//!     }
//! }
//! ```

use crate::codec::KernelError;
use crate::compression::{dequantize, from_wire, get_decompressor, ChunkBuffer, ChunkDecompressor};
use crate::cube::copy_chunk;
use crate::error::{OmError, Result};
use crate::geometry::{ArrayGeometry, ChunkDomain, CubeTarget, ReadRegion};
use crate::lut::{ChunkOffsets, LutCodec, LutLayout, RawLut};
use crate::plan::{Candidate, Cursor, DataRead, IndexRead, IoLimits};
use crate::runs::ChunkRuns;
use crate::types::{compression_bytes_per_element, CompressionScheme, DataType, OmElement};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Everything needed to build an [`OmDecoder`]
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub scalefactor: f32,
    pub compression: CompressionScheme,
    pub data_type: DataType,
    pub dims: Vec<u64>,
    pub chunks: Vec<u64>,
    pub read_offset: Vec<u64>,
    pub read_count: Vec<u64>,
    /// Defaults to the origin
    pub into_cube_offset: Option<Vec<u64>>,
    /// Defaults to `read_count`
    pub into_cube_dimension: Option<Vec<u64>>,
    pub lut: Option<LutLayout>,
    pub lut_codec: Arc<dyn LutCodec>,
    pub io: IoLimits,
}

impl DecoderConfig {
    /// Read the whole array with a scale factor of 1
    pub fn new(
        dims: Vec<u64>,
        chunks: Vec<u64>,
        compression: CompressionScheme,
        data_type: DataType,
    ) -> Self {
        Self {
            scalefactor: 1.0,
            compression,
            data_type,
            read_offset: vec![0; dims.len()],
            read_count: dims.clone(),
            dims,
            chunks,
            into_cube_offset: None,
            into_cube_dimension: None,
            lut: None,
            lut_codec: Arc::new(RawLut),
            io: IoLimits::default(),
        }
    }

    pub fn with_scalefactor(mut self, scalefactor: f32) -> Self {
        self.scalefactor = scalefactor;
        self
    }

    /// Set the region to read
    pub fn with_read(mut self, offset: Vec<u64>, count: Vec<u64>) -> Self {
        self.read_offset = offset;
        self.read_count = count;
        self
    }

    /// Set where the region lands in the destination buffer
    pub fn with_cube(mut self, offset: Vec<u64>, dims: Vec<u64>) -> Self {
        self.into_cube_offset = Some(offset);
        self.into_cube_dimension = Some(dims);
        self
    }

    pub fn with_lut(mut self, lut: LutLayout) -> Self {
        self.lut = Some(lut);
        self
    }

    pub fn with_lut_codec(mut self, codec: Arc<dyn LutCodec>) -> Self {
        self.lut_codec = codec;
        self
    }

    pub fn with_io_limits(mut self, io: IoLimits) -> Self {
        self.io = io;
        self
    }
}

/// Read planner and chunk decoder for one region of one array
#[derive(Debug, Clone)]
pub struct OmDecoder {
    geometry: ArrayGeometry,
    region: ReadRegion,
    cube: CubeTarget,
    scalefactor: f32,
    compression: CompressionScheme,
    data_type: DataType,
    decompressor: &'static dyn ChunkDecompressor,
    lut: LutLayout,
    lut_codec: Arc<dyn LutCodec>,
    io: IoLimits,
}

impl OmDecoder {
    /// Validate a configuration and build the decoder
    pub fn new(config: DecoderConfig) -> Result<Self> {
        let geometry = ArrayGeometry::new(config.dims, config.chunks)?;
        let ndim = geometry.ndim();

        if config.read_offset.len() != ndim || config.read_count.len() != ndim {
            return Err(OmError::InvalidDimensions(format!(
                "Read region has {}/{} dimensions, array has {}",
                config.read_offset.len(),
                config.read_count.len(),
                ndim
            )));
        }
        let region = ReadRegion::new(config.read_offset, config.read_count);
        if !geometry.contains(&region) {
            return Err(OmError::OutOfBounds(format!(
                "Read offset {:?} + count {:?} exceeds dimensions {:?}",
                region.offset,
                region.count,
                geometry.dims()
            )));
        }

        let cube = CubeTarget::new(
            config.into_cube_offset.unwrap_or_else(|| vec![0; ndim]),
            config
                .into_cube_dimension
                .unwrap_or_else(|| region.count.clone()),
        );
        if cube.offset.len() != ndim || cube.dims.len() != ndim {
            return Err(OmError::InvalidDimensions(format!(
                "Cube has {}/{} dimensions, array has {}",
                cube.offset.len(),
                cube.dims.len(),
                ndim
            )));
        }
        if !cube.fits(&region) {
            return Err(OmError::OutOfBounds(format!(
                "Cube offset {:?} + count {:?} exceeds cube dimensions {:?}",
                cube.offset, region.count, cube.dims
            )));
        }

        let decompressor = get_decompressor(config.compression, config.data_type).ok_or_else(|| {
            OmError::InvalidDataType(format!(
                "{} cannot be stored with {:?}",
                config.data_type, config.compression
            ))
        })?;
        if config.compression.is_lossy()
            && !(config.scalefactor.is_finite() && config.scalefactor > 0.0)
        {
            return Err(OmError::Configuration(format!(
                "Scale factor must be positive and finite, got {}",
                config.scalefactor
            )));
        }

        let lut = config
            .lut
            .ok_or_else(|| OmError::Configuration("LUT layout not set".to_string()))?;
        lut.validate()?;
        if config.lut_codec.stored_size(&lut) == 0 {
            return Err(OmError::Configuration(
                "LUT super-chunks must occupy at least one byte".to_string(),
            ));
        }

        debug!(
            dims = ?geometry.dims(),
            chunks = ?geometry.chunk_shape(),
            offset = ?region.offset,
            count = ?region.count,
            compression = ?config.compression,
            "created decoder"
        );

        Ok(Self {
            geometry,
            region,
            cube,
            scalefactor: config.scalefactor,
            compression: config.compression,
            data_type: config.data_type,
            decompressor,
            lut,
            lut_codec: config.lut_codec,
            io: config.io,
        })
    }

    pub fn geometry(&self) -> &ArrayGeometry {
        &self.geometry
    }

    pub fn region(&self) -> &ReadRegion {
        &self.region
    }

    pub fn cube(&self) -> &CubeTarget {
        &self.cube
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn compression(&self) -> CompressionScheme {
        self.compression
    }

    pub fn io_limits(&self) -> IoLimits {
        self.io
    }

    /// Scratch bytes needed to decode the largest chunk
    pub fn read_buffer_size(&self) -> u64 {
        self.geometry.max_chunk_elements()
            * compression_bytes_per_element(self.compression, self.data_type) as u64
    }

    fn runs(&self) -> ChunkRuns {
        ChunkRuns::new(&self.geometry, &self.region)
    }

    /// Start planning LUT reads
    pub fn index_read_init(&self) -> IndexRead {
        IndexRead::new(Cursor::new(self.runs()))
    }

    /// Plan the next LUT read; false when the index phase is complete
    pub fn next_index_read(&self, state: &mut IndexRead) -> bool {
        let lut = self.lut;
        let stored = self.lut_codec.stored_size(&lut);
        let per_read = (self.io.max / stored).max(1);

        let planned = state.advance(self.io, |next| {
            if next.is_empty() {
                return None;
            }
            let first = lut.super_chunk_of(next.start);
            let last = next.end.div_ceil(lut.chunk_length).min(first + per_read);
            Some(Candidate {
                offset: lut.start + first * stored,
                end: lut.start + last * stored,
                units: first..last,
                chunks_end: next.end.min(last * lut.chunk_length),
            })
        });
        if planned {
            debug!(
                offset = state.offset,
                count = state.count,
                chunks = ?state.chunk_index,
                "planned index read"
            );
        }
        planned
    }

    /// Decode the LUT bytes fetched for `index_read`
    pub fn decode_lut(&self, index_read: &IndexRead, bytes: &[u8]) -> Result<ChunkOffsets> {
        let count = index_read.count as usize;
        if bytes.len() < count {
            return Err(OmError::CorruptLut(format!(
                "index read of {} bytes returned {}",
                count,
                bytes.len()
            )));
        }
        ChunkOffsets::decode(
            self.lut_codec.as_ref(),
            &self.lut,
            index_read.index_range.start,
            &bytes[..count],
        )
    }

    /// Start planning data reads for the chunks `index_read` located
    pub fn data_read_init(&self, index_read: &IndexRead) -> DataRead {
        DataRead::new(index_read.data_cursor())
    }

    /// Plan the next chunk payload read; false when this index read is done
    pub fn next_data_read(&self, state: &mut DataRead, offsets: &ChunkOffsets) -> Result<bool> {
        let remaining = state.cursor().remaining();
        if !offsets.covers(&remaining) {
            return Err(OmError::LutMismatch {
                lower: remaining.start,
                upper: remaining.end,
            });
        }

        let planned = state.advance(self.io, |next| {
            if next.is_empty() {
                return None;
            }
            let chunk = next.start;
            let bytes = offsets.byte_range(chunk)?;
            Some(Candidate {
                offset: bytes.start,
                end: bytes.end,
                units: chunk..chunk + 1,
                chunks_end: chunk + 1,
            })
        });
        if planned {
            debug!(
                offset = state.offset,
                count = state.count,
                chunks = ?state.chunk_index,
                "planned data read"
            );
        }
        Ok(planned)
    }

    fn check_element<T: OmElement>(&self) -> Result<()> {
        if T::DATA_TYPE != self.data_type {
            return Err(OmError::TypeMismatch {
                expected: self.data_type,
                actual: T::DATA_TYPE,
            });
        }
        Ok(())
    }

    /// Decode every chunk of `data_read` that touches the region into `into`
    ///
    /// `data` holds the bytes fetched for `data_read`. Returns the number of
    /// elements written to `into`. Stops at the first corrupt chunk; chunks placed before it stay
    /// written.
    pub fn decode_chunks<T: OmElement>(
        &self,
        data_read: &DataRead,
        offsets: &ChunkOffsets,
        data: &[u8],
        into: &mut [T],
        scratch: &mut ChunkBuffer,
    ) -> Result<u64> {
        self.check_element::<T>()?;
        let cube_elements = self.cube.element_count();
        if (into.len() as u64) < cube_elements {
            return Err(OmError::BufferTooSmall {
                needed: cube_elements,
                available: into.len() as u64,
            });
        }
        if scratch.byte_len() < self.read_buffer_size() {
            return Err(OmError::BufferTooSmall {
                needed: self.read_buffer_size(),
                available: scratch.byte_len(),
            });
        }
        let chunks = data_read.chunk_index.clone();
        if !offsets.covers(&chunks) {
            return Err(OmError::LutMismatch {
                lower: chunks.start,
                upper: chunks.end,
            });
        }

        let mut placed = 0u64;
        for chunk in chunks {
            let domain = self.geometry.chunk_domain(&self.geometry.linear_to_coord(chunk));
            if !self.region.intersects(&domain) {
                continue;
            }

            let bytes = offsets
                .byte_range(chunk)
                .ok_or(OmError::LutMismatch {
                    lower: chunk,
                    upper: chunk + 1,
                })?;
            let start = bytes.start.checked_sub(data_read.offset).ok_or(OmError::LutMismatch {
                lower: chunk,
                upper: chunk + 1,
            })? as usize;
            let end = (bytes.end - data_read.offset) as usize;
            if end > data.len() {
                warn!(chunk, needed = end, available = data.len(), "chunk payload truncated");
                return Err(OmError::CorruptChunk {
                    chunk,
                    source: KernelError::Truncated {
                        needed: end,
                        available: data.len(),
                    },
                });
            }

            placed += self.decode_chunk(chunk, &domain, &data[start..end], into, scratch)?;
        }
        Ok(placed)
    }

    fn decode_chunk<T: OmElement>(
        &self,
        chunk: u64,
        domain: &ChunkDomain,
        raw: &[u8],
        into: &mut [T],
        scratch: &mut ChunkBuffer,
    ) -> Result<u64> {
        let count = domain.element_count() as usize;
        let dim1 = domain.extent[domain.extent.len() - 1] as usize;
        let dim0 = count / dim1;

        let used = self
            .decompressor
            .decompress(raw, dim0, dim1, scratch)
            .map_err(|source| {
                warn!(chunk, error = %source, "corrupt chunk");
                OmError::CorruptChunk { chunk, source }
            })?;

        let placed = match self.compression {
            CompressionScheme::Int16ScaledDelta | CompressionScheme::Int16ScaledDeltaLogarithmic => {
                let logarithmic = self.compression == CompressionScheme::Int16ScaledDeltaLogarithmic;
                let scalefactor = self.scalefactor;
                copy_chunk(
                    domain,
                    scratch.view::<i16>(count),
                    &self.region,
                    &self.cube,
                    into,
                    |src, dst| dequantize(src, dst, scalefactor, logarithmic),
                )
            }
            CompressionScheme::FloatXor if self.data_type == DataType::Double => copy_chunk(
                domain,
                scratch.view::<u64>(count),
                &self.region,
                &self.cube,
                into,
                |src, dst| from_wire(src, dst),
            ),
            CompressionScheme::FloatXor => copy_chunk(
                domain,
                scratch.view::<u32>(count),
                &self.region,
                &self.cube,
                into,
                |src, dst| from_wire(src, dst),
            ),
        };
        trace!(chunk, bytes = used, elements = placed, "decoded chunk");
        Ok(placed)
    }

    /// Run a whole decode session against a blocking byte fetcher
    pub fn decode_with<T, F, B>(&self, mut fetch: F, into: &mut [T]) -> Result<()>
    where
        T: OmElement,
        F: FnMut(u64, u64) -> Result<B>,
        B: AsRef<[u8]>,
    {
        self.check_element::<T>()?;
        let mut scratch = ChunkBuffer::new(self.read_buffer_size());
        let mut index_read = self.index_read_init();
        while self.next_index_read(&mut index_read) {
            let lut_bytes = fetch(index_read.offset, index_read.count)?;
            let offsets = self.decode_lut(&index_read, lut_bytes.as_ref())?;
            let mut data_read = self.data_read_init(&index_read);
            while self.next_data_read(&mut data_read, &offsets)? {
                let data = fetch(data_read.offset, data_read.count)?;
                self.decode_chunks(&data_read, &offsets, data.as_ref(), into, &mut scratch)?;
            }
        }
        Ok(())
    }
}
