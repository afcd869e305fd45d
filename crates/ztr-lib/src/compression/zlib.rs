//! zlib compression (format 2).
//!
//! Layout: `[2][uncompressed length: u32 LE][zlib stream]`
//!
//! Any zlib stream inflates correctly, so output only needs to decode, not to match the
//! reference tool's compressed bytes.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::FORMAT_ZLIB;
use crate::error::{Result, ZtrError};

/// Level used when none is configured (`flate2::Compression::default()`).
pub const DEFAULT_LEVEL: u32 = 6;

const HEADER_LEN: usize = 5;

pub fn encode(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let len = u32::try_from(data.len()).map_err(|_| {
        ZtrError::Encoding(format!("{} bytes is too large for zlib chunk data", data.len()))
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() / 2);
    out.push(FORMAT_ZLIB);
    out.extend_from_slice(&len.to_le_bytes());

    let mut encoder = ZlibEncoder::new(out, Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        return Err(ZtrError::malformed(format!(
            "zlib header needs {} bytes, found {}",
            HEADER_LEN,
            data.len()
        )));
    }
    if data[0] != FORMAT_ZLIB {
        return Err(ZtrError::malformed(format!(
            "expected zlib format {}, found {}",
            FORMAT_ZLIB, data[0]
        )));
    }
    let expected = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;

    // Cap the up-front allocation; a corrupt length must not allocate gigabytes.
    let mut out = Vec::with_capacity(expected.min(64 * data.len()));
    ZlibDecoder::new(&data[HEADER_LEN..])
        .read_to_end(&mut out)
        .map_err(|e| ZtrError::malformed(format!("zlib stream: {}", e)))?;

    if out.len() != expected {
        return Err(ZtrError::malformed(format!(
            "zlib data inflates to {} bytes, header says {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}
