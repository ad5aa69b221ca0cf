//! omfile-reader - region reads from chunked, compressed om files
//!
//! A pure Rust reader for the om file format: n-dimensional arrays stored as
//! independently compressed chunks, located through a chunked lookup table.
//!
//! # Features
//!
//! - Reads arbitrary hyper-rectangular regions into a caller-provided cube
//! - Coalesces neighbouring LUT and chunk reads into bounded I/O requests
//! - Int16 scaled-delta (linear and logarithmic) and float/double XOR codecs
//! - Synchronous planner core; async reader over file, memory and HTTP sources
//!
//! # Example
//!
//! ```rust,ignore
//! use omfile_reader::{OmFileMeta, OmReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let meta = OmFileMeta::from_json(&std::fs::read_to_string("temperature.json")?)?;
//! let reader = OmReader::open("file:///data/temperature.om", meta.variable("temperature_2m")?.clone()).await?;
//!
//! // 10x10 grid cells, all 24 hours
//! let region = reader.read_array::<f32>(&[300, 600, 0], &[10, 10, 24]).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod compression;
pub mod cube;
pub mod decoder;
pub mod error;
pub mod geometry;
pub mod io;
pub mod lut;
pub mod metadata;
pub mod plan;
pub mod reader;
pub mod runs;
pub mod types;
pub mod utils;

// Re-exports
pub use compression::{get_decompressor, ChunkBuffer, ChunkDecompressor};
pub use decoder::{DecoderConfig, OmDecoder};
pub use error::{OmError, Result};
pub use geometry::{ArrayGeometry, ChunkDomain, CubeTarget, ReadRegion};
pub use io::{open_source, ByteSource, FileSource, MemorySource, StorageBackend};
pub use lut::{ChunkOffsets, LutCodec, LutLayout, RawLut};
pub use metadata::{OmFileMeta, OmVariableMeta};
pub use plan::{DataRead, IndexRead, IoLimits};
pub use reader::OmReader;
pub use runs::ChunkRuns;
pub use types::{CompressionScheme, DataType, OmElement};

#[cfg(feature = "http-client")]
pub use io::HttpSource;

/// Version of the omfile-reader implementation
pub const OMFILE_READER_VERSION: &str = env!("CARGO_PKG_VERSION");
