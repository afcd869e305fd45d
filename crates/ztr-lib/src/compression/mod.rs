//! Chunk payload transforms and the file-level operations built on them.
//!
//! Every ZTR chunk payload starts with a format byte naming the outermost transform
//! applied to it. Raw data has format byte 0; each transform prepends its own format
//! byte and header, so a payload can be unwound without knowing how it was written.

pub mod chain;
pub mod codecs;
pub mod delta;
pub mod follow;
pub mod pipeline;
pub mod rle;
pub mod shrink;
pub mod zlib;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result as AnyResult};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cli::{InspectConfig, RecompressConfig};
use crate::error::{Result, ZtrError};
use crate::io::container;

pub use pipeline::{ZtrPipeline, ZtrPipelineBuilder};

/// Untransformed chunk data.
pub const FORMAT_RAW: u8 = 0;
pub const FORMAT_RLE: u8 = 1;
pub const FORMAT_ZLIB: u8 = 2;
pub const FORMAT_DELTA1: u8 = 64;
pub const FORMAT_DELTA2: u8 = 65;
pub const FORMAT_DELTA4: u8 = 66;
pub const FORMAT_16TO8: u8 = 70;
pub const FORMAT_32TO8: u8 = 71;
pub const FORMAT_FOLLOW1: u8 = 72;

/// Upper bound on nested transforms, enforced when a chain is built and when a payload
/// read from a stream is unwound.
pub const MAX_TRANSFORM_DEPTH: usize = 16;

/// Logical word size a delta or shrink transform reinterprets the bytes as.
/// Multi-byte words are big-endian, as in every ZTR chunk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordWidth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl WordWidth {
    pub fn bytes(self) -> usize {
        match self {
            WordWidth::Eight => 1,
            WordWidth::Sixteen => 2,
            WordWidth::ThirtyTwo => 4,
        }
    }

    pub fn bits(self) -> usize {
        self.bytes() * 8
    }

    /// Read one word from the front of `bytes` (which must hold at least `self.bytes()`).
    pub(crate) fn read(self, bytes: &[u8]) -> u32 {
        match self {
            WordWidth::Eight => bytes[0] as u32,
            WordWidth::Sixteen => u16::from_be_bytes([bytes[0], bytes[1]]) as u32,
            WordWidth::ThirtyTwo => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Append the low `self.bits()` bits of `word`.
    pub(crate) fn write(self, word: u32, out: &mut Vec<u8>) {
        match self {
            WordWidth::Eight => out.push(word as u8),
            WordWidth::Sixteen => out.extend_from_slice(&(word as u16).to_be_bytes()),
            WordWidth::ThirtyTwo => out.extend_from_slice(&word.to_be_bytes()),
        }
    }

    /// Sign-extend the low `self.bits()` bits of `word`.
    pub(crate) fn signed(self, word: u32) -> i32 {
        match self {
            WordWidth::Eight => word as u8 as i8 as i32,
            WordWidth::Sixteen => word as u16 as i16 as i32,
            WordWidth::ThirtyTwo => word as i32,
        }
    }
}

/// One reversible payload transform.
///
/// Encoding prepends the transform's format byte and header; decoding checks and strips
/// them. Parameters needed for decoding (delta level, guard byte, lengths) travel in the
/// header, so the decode side of every variant reads them from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Delta encoding of `level` (1-3) over words of `width`.
    Delta { level: u8, width: WordWidth },
    /// Run-length encoding with `guard` as the run marker.
    RunLength { guard: u8 },
    /// Narrow 16- or 32-bit words to one byte, escaping values that do not fit.
    Shrink { width: WordWidth },
    /// Successor-prediction residuals.
    Follow,
    /// zlib stream at compression `level` (0-9).
    Zlib { level: u32 },
}

impl Transform {
    /// Format byte this transform writes at the front of its output.
    pub fn format_byte(&self) -> u8 {
        match self {
            Transform::Delta { width: WordWidth::Eight, .. } => FORMAT_DELTA1,
            Transform::Delta { width: WordWidth::Sixteen, .. } => FORMAT_DELTA2,
            Transform::Delta { width: WordWidth::ThirtyTwo, .. } => FORMAT_DELTA4,
            Transform::RunLength { .. } => FORMAT_RLE,
            Transform::Shrink { width: WordWidth::ThirtyTwo } => FORMAT_32TO8,
            Transform::Shrink { .. } => FORMAT_16TO8,
            Transform::Follow => FORMAT_FOLLOW1,
            Transform::Zlib { .. } => FORMAT_ZLIB,
        }
    }

    /// Check the parameters are usable. Called by the builder before a chain is frozen.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Transform::Delta { level, .. } if !(1..=delta::MAX_LEVEL).contains(&level) => {
                Err(ZtrError::Configuration(format!(
                    "delta level {} outside 1..={}",
                    level,
                    delta::MAX_LEVEL
                )))
            }
            Transform::Shrink { width: WordWidth::Eight } => Err(ZtrError::Configuration(
                "shrink needs 16- or 32-bit words".to_string(),
            )),
            Transform::Zlib { level } if level > 9 => Err(ZtrError::Configuration(format!(
                "zlib level {} outside 0..=9",
                level
            ))),
            _ => Ok(()),
        }
    }

    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match *self {
            Transform::Delta { level, width } => delta::encode(data, level, width),
            Transform::RunLength { guard } => rle::encode(data, guard),
            Transform::Shrink { width } => shrink::encode(data, width),
            Transform::Follow => Ok(follow::encode(data)),
            Transform::Zlib { level } => zlib::encode(data, level),
        }
    }

    /// Undo this transform. The payload's format byte must match [`Self::format_byte`].
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match data.first() {
            Some(&format) if format == self.format_byte() => {}
            Some(&format) => {
                return Err(ZtrError::malformed(format!(
                    "expected format {} ({}), found format {}",
                    self.format_byte(),
                    self,
                    format
                )))
            }
            None => return Err(ZtrError::malformed(format!("empty {} payload", self))),
        }
        match *self {
            Transform::Delta { width, .. } => delta::decode(data, width),
            Transform::RunLength { .. } => rle::decode(data),
            Transform::Shrink { width } => shrink::decode(data, width),
            Transform::Follow => follow::decode(data),
            Transform::Zlib { .. } => zlib::decode(data),
        }
    }

    /// Identify the outermost transform of a payload from its header.
    /// Returns `None` for raw data.
    pub fn from_header(data: &[u8]) -> Result<Option<Transform>> {
        let format = *data
            .first()
            .ok_or_else(|| ZtrError::malformed("empty payload has no format byte"))?;
        let header_byte = |i: usize| {
            data.get(i).copied().ok_or_else(|| {
                ZtrError::malformed(format!("truncated header for format {}", format))
            })
        };
        let transform = match format {
            FORMAT_RAW => return Ok(None),
            FORMAT_RLE => Transform::RunLength { guard: header_byte(5)? },
            FORMAT_ZLIB => Transform::Zlib { level: zlib::DEFAULT_LEVEL },
            FORMAT_DELTA1 => Transform::Delta {
                level: header_byte(1)?,
                width: WordWidth::Eight,
            },
            FORMAT_DELTA2 => Transform::Delta {
                level: header_byte(1)?,
                width: WordWidth::Sixteen,
            },
            FORMAT_DELTA4 => Transform::Delta {
                level: header_byte(1)?,
                width: WordWidth::ThirtyTwo,
            },
            FORMAT_16TO8 => Transform::Shrink { width: WordWidth::Sixteen },
            FORMAT_32TO8 => Transform::Shrink { width: WordWidth::ThirtyTwo },
            FORMAT_FOLLOW1 => Transform::Follow,
            other => {
                return Err(ZtrError::malformed(format!("unsupported format byte {}", other)))
            }
        };
        Ok(Some(transform))
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Delta { level, width } => write!(f, "delta{}({})", width.bits(), level),
            Transform::RunLength { guard } => write!(f, "rle({})", guard),
            Transform::Shrink { width } => write!(f, "shrink{}", width.bits()),
            Transform::Follow => f.write_str("follow"),
            Transform::Zlib { .. } => f.write_str("zlib"),
        }
    }
}

/// Peel every transform off a payload until raw data (format 0) is reached.
///
/// Returns the raw payload and the transforms found, in the order they were applied
/// when encoding.
pub fn unwind(payload: &[u8]) -> Result<(Vec<u8>, Vec<Transform>)> {
    let mut data = payload.to_vec();
    let mut applied = Vec::new();
    while let Some(transform) = Transform::from_header(&data)? {
        if applied.len() == MAX_TRANSFORM_DEPTH {
            return Err(ZtrError::malformed(format!(
                "more than {} nested transforms",
                MAX_TRANSFORM_DEPTH
            )));
        }
        data = transform.decode(&data)?;
        applied.push(transform);
    }
    applied.reverse();
    Ok((data, applied))
}

// ── File-level operations ────────────────────────────────────────────────

/// Summary of one chunk record, as reported by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub tag: String,
    pub offset: usize,
    pub payload_len: usize,
    /// Size after unwinding every transform (0 for empty payloads).
    pub raw_len: usize,
    /// Transforms in the order they were applied when encoding.
    pub transforms: Vec<Transform>,
}

impl fmt::Display for ChunkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = if self.transforms.is_empty() {
            "raw".to_string()
        } else {
            self.transforms
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        };
        write!(
            f,
            "{} @{:<8} {:>9} bytes (raw {:>9})  {}",
            self.tag, self.offset, self.payload_len, self.raw_len, stack
        )
    }
}

/// List the chunk records of a ZTR file with their transform stacks.
pub fn inspect(args: &InspectConfig) -> AnyResult<Vec<ChunkSummary>> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read ZTR file: {:?}", args.input))?;

    let mut summaries = Vec::new();
    for record in container::read_chunks(&data)? {
        let record = record?;
        let (raw_len, transforms) = if record.payload.is_empty() {
            (0, Vec::new())
        } else {
            let (raw, transforms) = unwind(record.payload)
                .map_err(|e| e.in_chunk(record.tag_str(), record.offset))?;
            (raw.len(), transforms)
        };
        summaries.push(ChunkSummary {
            tag: record.tag_str(),
            offset: record.offset,
            payload_len: record.payload.len(),
            raw_len,
            transforms,
        });
    }
    debug!("{:?}: {} chunks", args.input, summaries.len());
    Ok(summaries)
}

/// Decode each input file and re-encode it with the configured preset.
///
/// Files are processed in parallel, one chromatogram per task.
pub fn recompress(args: &RecompressConfig) -> AnyResult<()> {
    let start_time = Instant::now();
    if args.input.is_empty() {
        anyhow::bail!("No input files");
    }

    let mut builder = ZtrPipelineBuilder::from_preset(args.preset);
    if let Some(level) = args.zlib_level {
        builder = builder.override_zlib_level(level);
    }
    let pipeline = builder.build().context("Invalid pipeline configuration")?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output_dir))?;

    let threads = if args.threads == 0 { crate::cli::num_cpus() } else { args.threads };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to build thread pool")?;

    info!(
        "Recompressing {} file(s) with {:?} preset on {} thread(s)",
        args.input.len(),
        args.preset,
        threads
    );

    let sizes: Vec<(usize, usize)> = pool.install(|| {
        args.input
            .par_iter()
            .map(|path| recompress_file(&pipeline, path, &args.output_dir))
            .collect::<AnyResult<Vec<_>>>()
    })?;

    let before: usize = sizes.iter().map(|(b, _)| b).sum();
    let after: usize = sizes.iter().map(|(_, a)| a).sum();
    info!(
        "Recompressed {} file(s): {} -> {} bytes in {:.2}s",
        sizes.len(),
        before,
        after,
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Recompress one file into `output_dir`, returning (input size, output size).
fn recompress_file(
    pipeline: &ZtrPipeline,
    path: &Path,
    output_dir: &Path,
) -> AnyResult<(usize, usize)> {
    let output = output_path(path, output_dir)?;
    if same_file(path, &output) {
        anyhow::bail!("Refusing to overwrite input file {:?}", path);
    }

    let data = std::fs::read(path).with_context(|| format!("Failed to read ZTR file: {:?}", path))?;
    let chromatogram = pipeline
        .decode_bytes(&data)
        .with_context(|| format!("Failed to decode {:?}", path))?;
    let encoded = pipeline
        .encode_to_vec(&chromatogram)
        .with_context(|| format!("Failed to encode {:?}", path))?;
    std::fs::write(&output, &encoded).with_context(|| format!("Failed to write {:?}", output))?;

    debug!(
        "{:?}: {} calls, {} samples, {} -> {} bytes",
        path,
        chromatogram.len(),
        chromatogram.channels.len(),
        data.len(),
        encoded.len()
    );
    Ok((data.len(), encoded.len()))
}

fn output_path(input: &Path, output_dir: &Path) -> AnyResult<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Input path has no file name: {:?}", input))?;
    Ok(output_dir.join(name))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
