//! Example: read a window of a variable from an om file
//!
//! Run with: cargo run --example read_region -- <metadata.json> <file.om> <variable> [offset,...] [count,...]
//!
//! Without arguments, a small demo file is generated in a temporary directory.

use anyhow::{bail, Context};
use omfile_reader::codec;
use omfile_reader::{
    CompressionScheme, DataType, IoLimits, OmFileMeta, OmReader, OmVariableMeta,
};
use std::time::Instant;

const USAGE: &str = "usage: read_region <metadata.json> <file.om> <variable> [offset,...] [count,...]";

fn parse_list(arg: &str) -> anyhow::Result<Vec<u64>> {
    arg.split(',')
        .map(|v| v.trim().parse::<u64>().with_context(|| format!("bad number '{}'", v)))
        .collect()
}

/// Counts reaching from `offset` to the end of every dimension
fn counts_to_end(dims: &[u64], offset: &[u64]) -> anyhow::Result<Vec<u64>> {
    if offset.len() != dims.len() {
        bail!("offset {:?} does not match dimensions {:?}\n{}", offset, dims, USAGE);
    }
    dims.iter()
        .zip(offset)
        .map(|(d, o)| d.checked_sub(*o))
        .collect::<Option<Vec<_>>>()
        .with_context(|| format!("offset {:?} exceeds dimensions {:?}\n{}", offset, dims, USAGE))
}

/// 48 x 96 grid of a smooth field, 8 x 16 chunks, int16 scaled by 20
fn write_demo_file(path: &std::path::Path) -> anyhow::Result<OmVariableMeta> {
    let (rows, cols, chunk_rows, chunk_cols) = (48usize, 96usize, 8usize, 16usize);
    let scalefactor = 20.0f32;
    let value = |r: usize, c: usize| {
        15.0 + (r as f32 * 0.1).sin() * 10.0 + (c as f32 * 0.05).cos() * 5.0
    };

    let mut bytes = Vec::new();
    let mut offsets = vec![0u64];
    for chunk_row in 0..rows / chunk_rows {
        for chunk_col in 0..cols / chunk_cols {
            let mut ints: Vec<i16> = (0..chunk_rows * chunk_cols)
                .map(|i| {
                    let r = chunk_row * chunk_rows + i / chunk_cols;
                    let c = chunk_col * chunk_cols + i % chunk_cols;
                    (value(r, c) * scalefactor).round() as i16
                })
                .collect();
            codec::delta2d_encode(&mut ints, chunk_rows, chunk_cols);
            let words: Vec<u16> = ints.iter().map(|&v| codec::zigzag_encode(v)).collect();
            let width = codec::required_bit_width(&words);
            bytes.push(width as u8);
            codec::encode_bitpacked(&words, width, &mut bytes);
            offsets.push(bytes.len() as u64);
        }
    }

    // All 36 chunks in one super-chunk
    let lut_offset = bytes.len() as u64;
    for offset in &offsets {
        bytes.extend(offset.to_le_bytes());
    }
    std::fs::write(path, &bytes)?;

    Ok(OmVariableMeta {
        name: "temperature_2m".to_string(),
        dimensions: vec![rows as u64, cols as u64],
        chunks: vec![chunk_rows as u64, chunk_cols as u64],
        dimension_names: vec!["lat".to_string(), "lon".to_string()],
        scalefactor,
        compression: CompressionScheme::Int16ScaledDelta,
        data_type: DataType::Float,
        lut_offset,
        lut_chunk_length: offsets.len() as u64 - 1,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("omfile-reader region demo");
    println!("=========================\n");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let _demo_dir;
    let (path, variable, offset, count) = match args.as_slice() {
        [] => {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("demo.om");
            let variable = write_demo_file(&path)?;
            _demo_dir = dir;
            (path.display().to_string(), variable, vec![10, 20], vec![4, 6])
        }
        [meta, file, name, rest @ ..] => {
            let json = std::fs::read_to_string(meta).with_context(|| format!("reading {}", meta))?;
            let meta = OmFileMeta::from_json(&json)?;
            let variable = meta.variable(name)?.clone();
            let offset = match rest.first() {
                Some(arg) => parse_list(arg)?,
                None => vec![0; variable.dimensions.len()],
            };
            let count = match rest.get(1) {
                Some(arg) => parse_list(arg)?,
                None => counts_to_end(&variable.dimensions, &offset)?,
            };
            (file.clone(), variable, offset, count)
        }
        _ => bail!(USAGE),
    };

    println!("Variable: {}", variable.summary());
    println!("Region:   offset {:?}, count {:?}\n", offset, count);

    let reader = OmReader::open(&path, variable)
        .await?
        .with_io_limits(IoLimits::new(512, 65536));

    let start = Instant::now();
    let region = reader.read_array::<f32>(&offset, &count).await?;
    println!("Read {} values in {:?}\n", region.len(), start.elapsed());

    if region.ndim() == 2 {
        for row in region.outer_iter() {
            let line: Vec<String> = row.iter().map(|v| format!("{:7.2}", v)).collect();
            println!("  {}", line.join(" "));
        }
    } else {
        println!("{:?}", region);
    }
    Ok(())
}
