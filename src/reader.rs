//! Async reader - main API for reading regions of an om file variable

use crate::compression::ChunkBuffer;
use crate::decoder::OmDecoder;
use crate::error::{OmError, Result};
use crate::io::{open_source, ByteSource};
use crate::metadata::OmVariableMeta;
use crate::plan::IoLimits;
use crate::types::OmElement;
use crate::utils::{format_bytes, read_amplification};
use futures::future::try_join_all;
use ndarray::{ArrayD, IxDyn};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Reads regions of one variable from a byte source
pub struct OmReader {
    /// Where the file bytes come from
    source: Arc<dyn ByteSource>,

    /// Layout and encoding of the variable
    variable: OmVariableMeta,

    io: IoLimits,

    /// Scratch buffers of finished sessions, reused by later ones
    scratch: Mutex<Vec<ChunkBuffer>>,
}

impl OmReader {
    pub fn new(source: Arc<dyn ByteSource>, variable: OmVariableMeta) -> Self {
        Self {
            source,
            variable,
            io: IoLimits::default(),
            scratch: Mutex::new(Vec::new()),
        }
    }

    /// Open the file at `url` and read `variable` from it
    pub async fn open(url: &str, variable: OmVariableMeta) -> Result<Self> {
        let source: Arc<dyn ByteSource> = Arc::from(open_source(url).await?);
        debug!(url, variable = %variable.summary(), "opened om file");
        Ok(Self::new(source, variable))
    }

    pub fn with_io_limits(mut self, io: IoLimits) -> Self {
        self.io = io;
        self
    }

    pub fn variable(&self) -> &OmVariableMeta {
        &self.variable
    }

    /// Decoder for `count` elements starting at `offset`, landing at the cube origin
    pub fn decoder(&self, offset: &[u64], count: &[u64]) -> Result<OmDecoder> {
        OmDecoder::new(
            self.variable
                .decoder_config()
                .with_read(offset.to_vec(), count.to_vec())
                .with_io_limits(self.io),
        )
    }

    fn take_scratch(&self, bytes: u64) -> ChunkBuffer {
        let mut buffer = self.scratch.lock().pop().unwrap_or_default();
        buffer.reserve_bytes(bytes);
        buffer
    }

    fn return_scratch(&self, buffer: ChunkBuffer) {
        self.scratch.lock().push(buffer);
    }

    /// Run a full decode session for `decoder` into `into`
    ///
    /// The data reads planned from one LUT read are fetched concurrently and
    /// decoded in plan order.
    pub async fn read_into<T: OmElement>(&self, decoder: &OmDecoder, into: &mut [T]) -> Result<()> {
        let mut scratch = self.take_scratch(decoder.read_buffer_size());
        let result = self.run_session(decoder, into, &mut scratch).await;
        self.return_scratch(scratch);
        result
    }

    async fn run_session<T: OmElement>(
        &self,
        decoder: &OmDecoder,
        into: &mut [T],
        scratch: &mut ChunkBuffer,
    ) -> Result<()> {
        let mut fetched = 0u64;
        let mut placed = 0u64;

        let mut index_read = decoder.index_read_init();
        while decoder.next_index_read(&mut index_read) {
            let lut = self.source.fetch(index_read.offset, index_read.count).await?;
            fetched += lut.len() as u64;
            let offsets = decoder.decode_lut(&index_read, &lut)?;

            let mut data_read = decoder.data_read_init(&index_read);
            let mut planned = Vec::new();
            while decoder.next_data_read(&mut data_read, &offsets)? {
                planned.push(data_read.clone());
            }

            let payloads = try_join_all(
                planned
                    .iter()
                    .map(|read| self.source.fetch(read.offset, read.count)),
            )
            .await?;

            for (read, data) in planned.iter().zip(&payloads) {
                fetched += data.len() as u64;
                placed += decoder.decode_chunks(read, &offsets, data, into, scratch)?;
            }
        }

        let decoded = decoder.region().element_count() * decoder.data_type().size_in_bytes() as u64;
        debug!(
            variable = %self.variable.name,
            fetched = %format_bytes(fetched),
            elements = placed,
            amplification = read_amplification(fetched, decoded),
            "read complete"
        );
        Ok(())
    }

    /// Read `count` elements starting at `offset` into a flat row-major vector
    pub async fn read<T: OmElement>(&self, offset: &[u64], count: &[u64]) -> Result<Vec<T>> {
        let decoder = self.decoder(offset, count)?;
        let mut values = vec![T::nan(); decoder.cube().element_count() as usize];
        self.read_into(&decoder, &mut values).await?;
        Ok(values)
    }

    /// Read `count` elements starting at `offset` as an n-dimensional array
    pub async fn read_array<T: OmElement>(&self, offset: &[u64], count: &[u64]) -> Result<ArrayD<T>> {
        let values = self.read::<T>(offset, count).await?;
        let shape: Vec<usize> = count.iter().map(|&n| n as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| OmError::InvalidDimensions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::tests::build_fixture;
    use crate::io::MemorySource;
    use crate::types::{CompressionScheme, DataType};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn variable(
        dims: &[u64],
        chunks: &[u64],
        compression: CompressionScheme,
        lut_offset: u64,
        lut_chunk_length: u64,
    ) -> OmVariableMeta {
        OmVariableMeta {
            name: "temperature".to_string(),
            dimensions: dims.to_vec(),
            chunks: chunks.to_vec(),
            dimension_names: Vec::new(),
            scalefactor: 100.0,
            compression,
            data_type: DataType::Float,
            lut_offset,
            lut_chunk_length,
        }
    }

    fn values(n: u64) -> Vec<f32> {
        (0..n).map(|i| ((i * 37) % 91) as f32 * 0.25).collect()
    }

    fn memory_reader(compression: CompressionScheme) -> (OmReader, Vec<f32>) {
        let dims = [12u64, 10];
        let chunks = [5u64, 3];
        let data = values(120);
        let fixture = build_fixture(&dims, &chunks, &data, compression, 100.0, 3);
        let source = Arc::new(MemorySource::new(fixture.bytes));
        let reader = OmReader::new(
            source,
            variable(&dims, &chunks, compression, fixture.lut.start, 3),
        );
        (reader, data)
    }

    #[tokio::test]
    async fn test_read_region() {
        let (reader, data) = memory_reader(CompressionScheme::FloatXor);
        let region = reader.read::<f32>(&[2, 4], &[6, 5]).await.unwrap();
        assert_eq!(region.len(), 30);
        for r in 0..6 {
            for c in 0..5 {
                assert_eq!(region[r * 5 + c], data[(r + 2) * 10 + c + 4]);
            }
        }
    }

    #[tokio::test]
    async fn test_read_array_shape() {
        let (reader, data) = memory_reader(CompressionScheme::Int16ScaledDelta);
        let array = reader.read_array::<f32>(&[0, 0], &[12, 10]).await.unwrap();
        assert_eq!(array.shape(), &[12, 10]);
        assert!((array[IxDyn(&[7, 3])] - data[73]).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_small_io_limits_give_same_result() {
        let (reader, _) = memory_reader(CompressionScheme::FloatXor);
        let expected = reader.read::<f32>(&[1, 1], &[10, 8]).await.unwrap();
        let reader = reader.with_io_limits(IoLimits::new(0, 16));
        assert_eq!(reader.read::<f32>(&[1, 1], &[10, 8]).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_pool() {
        let (reader, data) = memory_reader(CompressionScheme::FloatXor);
        let (a, b) = tokio::join!(
            reader.read::<f32>(&[0, 0], &[6, 10]),
            reader.read::<f32>(&[6, 0], &[6, 10])
        );
        let mut joined = a.unwrap();
        joined.extend(b.unwrap());
        assert_eq!(joined, data);
        assert!(!reader.scratch.lock().is_empty());
    }

    #[tokio::test]
    async fn test_type_and_bounds_errors() {
        let (reader, _) = memory_reader(CompressionScheme::FloatXor);
        assert!(matches!(
            reader.read::<f64>(&[0, 0], &[1, 1]).await,
            Err(OmError::TypeMismatch { .. })
        ));
        assert!(matches!(
            reader.read::<f32>(&[10, 0], &[3, 1]).await,
            Err(OmError::OutOfBounds(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_source() {
        let dims = [12u64, 10];
        let chunks = [5u64, 3];
        let fixture = build_fixture(&dims, &chunks, &values(120), CompressionScheme::FloatXor, 1.0, 3);
        // Drop everything after the first chunk, LUT included
        let cut = fixture.chunk_offsets[1] as usize;
        let source = Arc::new(MemorySource::new(fixture.bytes[..cut].to_vec()));
        let reader = OmReader::new(
            source,
            variable(&dims, &chunks, CompressionScheme::FloatXor, fixture.lut.start, 3),
        );
        assert!(matches!(
            reader.read::<f32>(&[0, 0], &[12, 10]).await,
            Err(OmError::OutOfBounds(_))
        ));
    }

    #[tokio::test]
    async fn test_open_file() {
        let dims = [8u64, 8];
        let chunks = [4u64, 4];
        let data = values(64);
        let fixture = build_fixture(&dims, &chunks, &data, CompressionScheme::FloatXor, 1.0, 2);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&fixture.bytes).unwrap();
        file.flush().unwrap();

        let url = format!("file://{}", file.path().display());
        let reader = OmReader::open(
            &url,
            variable(&dims, &chunks, CompressionScheme::FloatXor, fixture.lut.start, 2),
        )
        .await
        .unwrap();
        assert_eq!(reader.read::<f32>(&[0, 0], &[8, 8]).await.unwrap(), data);
    }
}
