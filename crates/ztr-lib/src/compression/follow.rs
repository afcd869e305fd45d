//! Successor prediction (format 72).
//!
//! For every byte value the table records the value that most often follows it. Each
//! byte after the first is stored as `table[previous] - current`, which is zero
//! whenever the prediction holds. Shrunk sample traces are highly repetitive at the
//! byte level, so this turns them into long zero runs for the run-length stage.
//!
//! Layout: `[72][table: 256 bytes][first byte][residuals...]`

use super::FORMAT_FOLLOW1;
use crate::error::{Result, ZtrError};

const TABLE_LEN: usize = 256;
const HEADER_LEN: usize = 1 + TABLE_LEN;

/// Most frequent successor of each byte value. Ties go to the smaller value; values
/// never seen as a predecessor map to 0.
fn successor_table(data: &[u8]) -> [u8; TABLE_LEN] {
    let mut counts = vec![0u32; TABLE_LEN * TABLE_LEN];
    for pair in data.windows(2) {
        counts[pair[0] as usize * TABLE_LEN + pair[1] as usize] += 1;
    }

    let mut table = [0u8; TABLE_LEN];
    for (prev, row) in counts.chunks_exact(TABLE_LEN).enumerate() {
        let mut best = 0;
        for (next, &count) in row.iter().enumerate() {
            if count > row[best] {
                best = next;
            }
        }
        table[prev] = best as u8;
    }
    table
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let table = successor_table(data);

    let mut out = Vec::with_capacity(HEADER_LEN + data.len());
    out.push(FORMAT_FOLLOW1);
    out.extend_from_slice(&table);
    if let Some(&first) = data.first() {
        out.push(first);
        for pair in data.windows(2) {
            out.push(table[pair[0] as usize].wrapping_sub(pair[1]));
        }
    }
    out
}

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        return Err(ZtrError::malformed(format!(
            "follow header needs {} bytes, found {}",
            HEADER_LEN,
            data.len()
        )));
    }
    if data[0] != FORMAT_FOLLOW1 {
        return Err(ZtrError::malformed(format!(
            "expected follow format {}, found {}",
            FORMAT_FOLLOW1, data[0]
        )));
    }
    let table = &data[1..HEADER_LEN];
    let body = &data[HEADER_LEN..];

    let mut out = Vec::with_capacity(body.len());
    let mut iter = body.iter();
    if let Some(&first) = iter.next() {
        let mut prev = first;
        out.push(first);
        for &residual in iter {
            let cur = table[prev as usize].wrapping_sub(residual);
            out.push(cur);
            prev = cur;
        }
    }
    Ok(out)
}
