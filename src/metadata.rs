//! Om file metadata structures

use crate::decoder::DecoderConfig;
use crate::error::{OmError, Result};
use crate::lut::LutLayout;
use crate::types::{CompressionScheme, DataType};
use crate::utils::format_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Om file format version
pub const OM_FORMAT_VERSION: u16 = 3;

fn default_version() -> u16 {
    OM_FORMAT_VERSION
}

fn default_scalefactor() -> f32 {
    1.0
}

/// Variables stored in one om file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmFileMeta {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u16,

    pub variables: Vec<OmVariableMeta>,

    /// Free-form attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl OmFileMeta {
    pub fn new(variables: Vec<OmVariableMeta>) -> Self {
        Self {
            version: OM_FORMAT_VERSION,
            variables,
            attributes: HashMap::new(),
        }
    }

    /// Parse and validate JSON metadata
    pub fn from_json(json: &str) -> Result<Self> {
        let meta: Self = serde_json::from_str(json)?;
        if meta.version != OM_FORMAT_VERSION {
            return Err(OmError::Metadata(format!(
                "Unsupported format version {} (expected {})",
                meta.version, OM_FORMAT_VERSION
            )));
        }
        for variable in &meta.variables {
            variable.validate()?;
        }
        Ok(meta)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Result<&OmVariableMeta> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| OmError::Metadata(format!("No variable named '{}'", name)))
    }

    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// Layout and encoding of one stored array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmVariableMeta {
    pub name: String,

    /// Array extent per dimension
    pub dimensions: Vec<u64>,

    /// Chunk extent per dimension
    pub chunks: Vec<u64>,

    #[serde(default)]
    pub dimension_names: Vec<String>,

    #[serde(default = "default_scalefactor")]
    pub scalefactor: f32,

    pub compression: CompressionScheme,

    pub data_type: DataType,

    /// Byte offset of the first LUT super-chunk
    pub lut_offset: u64,

    /// Chunks per LUT super-chunk
    pub lut_chunk_length: u64,
}

impl OmVariableMeta {
    fn validate(&self) -> Result<()> {
        if self.dimensions.len() != self.chunks.len() {
            return Err(OmError::Metadata(format!(
                "Variable '{}' has {} dimensions but {} chunk extents",
                self.name,
                self.dimensions.len(),
                self.chunks.len()
            )));
        }
        if !self.dimension_names.is_empty() && self.dimension_names.len() != self.dimensions.len() {
            return Err(OmError::Metadata(format!(
                "Variable '{}' names {} of {} dimensions",
                self.name,
                self.dimension_names.len(),
                self.dimensions.len()
            )));
        }
        Ok(())
    }

    pub fn lut_layout(&self) -> LutLayout {
        LutLayout::new(self.lut_offset, self.lut_chunk_length)
    }

    /// Decoder configuration reading the whole variable
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::new(
            self.dimensions.clone(),
            self.chunks.clone(),
            self.compression,
            self.data_type,
        )
        .with_scalefactor(self.scalefactor)
        .with_lut(self.lut_layout())
    }

    pub fn element_count(&self) -> u64 {
        self.dimensions.iter().product()
    }

    /// One-line description for logs and listings
    pub fn summary(&self) -> String {
        let shape = if self.dimension_names.is_empty() {
            format!("{:?}", self.dimensions)
        } else {
            let axes: Vec<String> = self
                .dimension_names
                .iter()
                .zip(&self.dimensions)
                .map(|(name, n)| format!("{}={}", name, n))
                .collect();
            format!("[{}]", axes.join(", "))
        };
        format!(
            "{} {} {} chunks {:?} {:?} ({} decoded)",
            self.name,
            self.data_type,
            shape,
            self.chunks,
            self.compression,
            format_bytes(self.element_count() * self.data_type.size_in_bytes() as u64)
        )
    }
}
