//! Error types for om file decoding

use crate::codec::KernelError;
use thiserror::Error;

/// Main error type for om file operations
#[derive(Error, Debug)]
pub enum OmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Element type mismatch: decoder holds {expected}, buffer holds {actual}")]
    TypeMismatch {
        expected: crate::types::DataType,
        actual: crate::types::DataType,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Corrupt chunk {chunk}: {source}")]
    CorruptChunk {
        chunk: u64,
        #[source]
        source: KernelError,
    },

    #[error("Corrupt lookup table: {0}")]
    CorruptLut(String),

    #[error("Lookup table offsets do not cover chunks {lower}..{upper}")]
    LutMismatch { lower: u64, upper: u64 },

    #[error("Buffer too small: need {needed}, got {available}")]
    BufferTooSmall { needed: u64, available: u64 },

    #[error("Storage backend error: {0}")]
    StorageBackend(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Specialized Result type for om file operations
pub type Result<T> = std::result::Result<T, OmError>;

impl From<serde_json::Error> for OmError {
    fn from(err: serde_json::Error) -> Self {
        OmError::Metadata(err.to_string())
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for OmError {
    fn from(err: reqwest::Error) -> Self {
        OmError::Network(err.to_string())
    }
}
