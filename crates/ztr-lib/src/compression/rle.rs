//! Run-length encoding with a guard byte (format 1).
//!
//! Layout: `[1][uncompressed length: u32 LE][guard][records...]`
//!
//! - A run of 4 to 255 identical bytes becomes `guard, count, value`; longer runs are
//!   split into several records.
//! - A literal guard byte outside such a run becomes `guard, 0`.
//! - Every other byte is copied.
//!
//! The guard should be rare in the target data: every literal occurrence costs an
//! extra byte.

use super::FORMAT_RLE;
use crate::error::{Result, ZtrError};

/// Guard used for sample traces by the reference tool.
pub const DEFAULT_GUARD: u8 = 150;
/// Guard used for confidence values by the reference tool.
pub const CONFIDENCE_GUARD: u8 = 77;
/// Shortest run worth a three-byte record.
pub const MIN_RUN: usize = 4;
/// Longest run one record can describe (count is a single byte).
pub const MAX_RUN: usize = 255;

const HEADER_LEN: usize = 6;

pub fn encode(data: &[u8], guard: u8) -> Result<Vec<u8>> {
    let len = u32::try_from(data.len()).map_err(|_| {
        ZtrError::Encoding(format!("{} bytes is too large for run-length encoding", data.len()))
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() + data.len() / 8);
    out.push(FORMAT_RLE);
    out.extend_from_slice(&len.to_le_bytes());
    out.push(guard);

    let mut i = 0;
    while i < data.len() {
        let value = data[i];
        let run = data[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == value)
            .count();

        if run >= MIN_RUN {
            out.extend_from_slice(&[guard, run as u8, value]);
            i += run;
        } else {
            if value == guard {
                out.extend_from_slice(&[guard, 0]);
            } else {
                out.push(value);
            }
            i += 1;
        }
    }
    Ok(out)
}

/// Undo run-length encoding; the guard and expected length come from the header.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        return Err(ZtrError::malformed(format!(
            "run-length header needs {} bytes, found {}",
            HEADER_LEN,
            data.len()
        )));
    }
    if data[0] != FORMAT_RLE {
        return Err(ZtrError::malformed(format!(
            "expected run-length format {}, found {}",
            FORMAT_RLE, data[0]
        )));
    }
    let expected = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
    let guard = data[5];
    let body = &data[HEADER_LEN..];

    let mut out = Vec::with_capacity(expected.min(body.len().saturating_mul(MAX_RUN)));
    let mut i = 0;
    while i < body.len() {
        let byte = body[i];
        if byte != guard {
            out.push(byte);
            i += 1;
            continue;
        }

        let count = *body.get(i + 1).ok_or_else(|| {
            ZtrError::malformed(format!(
                "truncated run-length record at byte {}",
                HEADER_LEN + i
            ))
        })? as usize;
        if count == 0 {
            out.push(guard);
            i += 2;
        } else {
            let value = *body.get(i + 2).ok_or_else(|| {
                ZtrError::malformed(format!(
                    "truncated run-length record at byte {}",
                    HEADER_LEN + i
                ))
            })?;
            out.resize(out.len() + count, value);
            i += 3;
        }
    }

    if out.len() != expected {
        return Err(ZtrError::malformed(format!(
            "run-length data expands to {} bytes, header says {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}
