//! Test-only om file writer

#![allow(dead_code)]

use ndarray::{ArrayD, Dimension, Slice};
use omfile_reader::codec::{self, PackedWord};
use omfile_reader::{CompressionScheme, DataType, OmVariableMeta};

/// Leading bytes so that no chunk starts at offset zero
const HEADER: &[u8] = b"OM\x03";

pub struct WrittenFile {
    pub bytes: Vec<u8>,
    pub variable: OmVariableMeta,
    /// `chunk_offsets[i]..chunk_offsets[i + 1]` is the payload of chunk `i`
    pub chunk_offsets: Vec<u64>,
}

pub struct OmWriter {
    pub chunks: Vec<u64>,
    pub compression: CompressionScheme,
    pub data_type: DataType,
    pub scalefactor: f32,
    pub lut_chunk_length: u64,
}

impl OmWriter {
    pub fn new(chunks: &[u64], compression: CompressionScheme, data_type: DataType) -> Self {
        Self {
            chunks: chunks.to_vec(),
            compression,
            data_type,
            scalefactor: 1.0,
            lut_chunk_length: 4,
        }
    }

    pub fn scalefactor(mut self, scalefactor: f32) -> Self {
        self.scalefactor = scalefactor;
        self
    }

    pub fn lut_chunk_length(mut self, lut_chunk_length: u64) -> Self {
        self.lut_chunk_length = lut_chunk_length;
        self
    }

    fn encode_chunk(&self, values: &[f64], dim0: usize, dim1: usize) -> Vec<u8> {
        match (self.compression, self.data_type) {
            (CompressionScheme::FloatXor, DataType::Double) => {
                let mut words: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
                codec::xor2d_encode(&mut words, dim0, dim1);
                pack(&words)
            }
            (CompressionScheme::FloatXor, _) => {
                let mut words: Vec<u32> = values.iter().map(|&v| (v as f32).to_bits()).collect();
                codec::xor2d_encode(&mut words, dim0, dim1);
                pack(&words)
            }
            (scheme, _) => {
                let logarithmic = scheme == CompressionScheme::Int16ScaledDeltaLogarithmic;
                let mut ints: Vec<i16> = values
                    .iter()
                    .map(|&v| quantize(v as f32, self.scalefactor, logarithmic))
                    .collect();
                codec::delta2d_encode(&mut ints, dim0, dim1);
                let words: Vec<u16> = ints.iter().map(|&v| codec::zigzag_encode(v)).collect();
                pack(&words)
            }
        }
    }

    /// Chunk payloads after a short header, followed by a raw LUT
    pub fn write(&self, name: &str, array: &ArrayD<f64>) -> WrittenFile {
        let dims: Vec<u64> = array.shape().iter().map(|&n| n as u64).collect();
        let grid: Vec<u64> = dims
            .iter()
            .zip(&self.chunks)
            .map(|(&n, &c)| n.div_ceil(c))
            .collect();
        let chunk_count: u64 = grid.iter().product();

        let mut bytes = HEADER.to_vec();
        let mut chunk_offsets = vec![bytes.len() as u64];
        for chunk in 0..chunk_count {
            let mut rest = chunk;
            let mut coord = vec![0u64; grid.len()];
            for i in (0..grid.len()).rev() {
                coord[i] = rest % grid[i];
                rest /= grid[i];
            }
            let view = array.slice_each_axis(|axis| {
                let i = axis.axis.index();
                let start = coord[i] * self.chunks[i];
                let end = (start + self.chunks[i]).min(dims[i]);
                Slice::from(start as usize..end as usize)
            });
            let dim1 = view.shape()[view.ndim() - 1];
            let dim0 = view.len() / dim1;
            let values: Vec<f64> = view.iter().copied().collect();
            bytes.extend(self.encode_chunk(&values, dim0, dim1));
            chunk_offsets.push(bytes.len() as u64);
        }

        let lut_offset = bytes.len() as u64;
        let l = self.lut_chunk_length as usize;
        let super_chunks = chunk_count.div_ceil(self.lut_chunk_length) as usize;
        let mut padded = chunk_offsets.clone();
        padded.resize(super_chunks * l + 1, *chunk_offsets.last().unwrap());
        for k in 0..super_chunks {
            for offset in &padded[k * l..=(k + 1) * l] {
                bytes.extend(offset.to_le_bytes());
            }
        }

        WrittenFile {
            bytes,
            variable: OmVariableMeta {
                name: name.to_string(),
                dimensions: dims,
                chunks: self.chunks.clone(),
                dimension_names: Vec::new(),
                scalefactor: self.scalefactor,
                compression: self.compression,
                data_type: self.data_type,
                lut_offset,
                lut_chunk_length: self.lut_chunk_length,
            },
            chunk_offsets,
        }
    }
}

fn pack<W: PackedWord>(words: &[W]) -> Vec<u8> {
    let width = codec::required_bit_width(words);
    let mut out = vec![width as u8];
    codec::encode_bitpacked(words, width, &mut out);
    out
}

pub fn quantize(value: f32, scalefactor: f32, logarithmic: bool) -> i16 {
    if value.is_nan() {
        return i16::MAX;
    }
    let value = if logarithmic { value.ln_1p() } else { value };
    (value * scalefactor)
        .round()
        .clamp(i16::MIN as f32, (i16::MAX - 1) as f32) as i16
}

/// Deterministic smooth field with some structure along every axis
pub fn field(shape: &[usize]) -> ArrayD<f64> {
    ArrayD::from_shape_fn(shape, |index| {
        index
            .slice()
            .iter()
            .enumerate()
            .map(|(axis, &i)| ((i as f64) * 0.37 + axis as f64).sin() * (axis + 1) as f64)
            .sum::<f64>()
            * 10.0
    })
}
