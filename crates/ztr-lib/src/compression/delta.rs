//! Delta encoding over fixed-width words (formats 64, 65 and 66).
//!
//! Level 1 stores first differences, level 2 the differences of those, level 3 one more
//! pass. This equals predicting each word from its predecessors (`u1`, `2*u1 - u2`,
//! `3*u1 - 3*u2 + u3`, with zero before the start) and storing the residual. Level 1
//! suits slowly varying 8/16-bit data such as confidence values and peak positions;
//! level 3 suits the smooth curves of the sample traces.
//!
//! Arithmetic wraps modulo the word width so decoding restores every value exactly.
//!
//! Layout: `[format][level]` for 8 and 16-bit words, `[format][level][0][0]` for 32-bit
//! words so the data stays 4-byte aligned. A trailing partial word is copied verbatim.

use super::{WordWidth, FORMAT_DELTA1, FORMAT_DELTA2, FORMAT_DELTA4};
use crate::error::{Result, ZtrError};

pub const MAX_LEVEL: u8 = 3;

fn format_for(width: WordWidth) -> u8 {
    match width {
        WordWidth::Eight => FORMAT_DELTA1,
        WordWidth::Sixteen => FORMAT_DELTA2,
        WordWidth::ThirtyTwo => FORMAT_DELTA4,
    }
}

fn header_len(width: WordWidth) -> usize {
    match width {
        WordWidth::ThirtyTwo => 4,
        _ => 2,
    }
}

/// Read `data` as whole words plus a trailing remainder.
fn split_words(data: &[u8], width: WordWidth) -> (Vec<u32>, &[u8]) {
    let chunks = data.chunks_exact(width.bytes());
    let tail = chunks.remainder();
    (chunks.map(|w| width.read(w)).collect(), tail)
}

/// Replace each word with its difference from the previous one.
fn difference(words: &mut [u32]) {
    let mut prev = 0u32;
    for word in words.iter_mut() {
        let cur = *word;
        *word = cur.wrapping_sub(prev);
        prev = cur;
    }
}

/// Inverse of [`difference`]: running sum.
fn accumulate(words: &mut [u32]) {
    let mut sum = 0u32;
    for word in words.iter_mut() {
        sum = sum.wrapping_add(*word);
        *word = sum;
    }
}

pub fn encode(data: &[u8], level: u8, width: WordWidth) -> Result<Vec<u8>> {
    if !(1..=MAX_LEVEL).contains(&level) {
        return Err(ZtrError::Encoding(format!("delta level {} outside 1..={}", level, MAX_LEVEL)));
    }

    let (mut words, tail) = split_words(data, width);
    for _ in 0..level {
        difference(&mut words);
    }

    let mut out = Vec::with_capacity(header_len(width) + data.len());
    out.push(format_for(width));
    out.push(level);
    out.resize(header_len(width), 0);
    for word in words {
        width.write(word, &mut out);
    }
    out.extend_from_slice(tail);
    Ok(out)
}

/// Undo delta encoding; the level is read from the header.
pub fn decode(data: &[u8], width: WordWidth) -> Result<Vec<u8>> {
    let header = header_len(width);
    if data.len() < header {
        return Err(ZtrError::malformed(format!(
            "delta header needs {} bytes, found {}",
            header,
            data.len()
        )));
    }
    if data[0] != format_for(width) {
        return Err(ZtrError::malformed(format!(
            "expected delta format {}, found {}",
            format_for(width),
            data[0]
        )));
    }
    let level = data[1];
    if !(1..=MAX_LEVEL).contains(&level) {
        return Err(ZtrError::malformed(format!("invalid delta level {}", level)));
    }

    let (mut words, tail) = split_words(&data[header..], width);
    for _ in 0..level {
        accumulate(&mut words);
    }

    let mut out = Vec::with_capacity(data.len() - header);
    for word in words {
        width.write(word, &mut out);
    }
    out.extend_from_slice(tail);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTHS: [WordWidth; 3] = [WordWidth::Eight, WordWidth::Sixteen, WordWidth::ThirtyTwo];

    #[test]
    fn test_level1_bytes() {
        let encoded = encode(&[10, 12, 15, 15, 11], 1, WordWidth::Eight).unwrap();
        assert_eq!(encoded, vec![FORMAT_DELTA1, 1, 10, 2, 3, 0, 252]);
        assert_eq!(decode(&encoded, WordWidth::Eight).unwrap(), vec![10, 12, 15, 15, 11]);
    }

    #[test]
    fn test_level2_matches_predictor() {
        // residual = u - (2*u1 - u2)
        let encoded = encode(&[1, 3, 6, 10], 2, WordWidth::Eight).unwrap();
        assert_eq!(&encoded[2..], &[1, 1, 1, 1]);
    }

    #[test]
    fn test_level3_matches_predictor() {
        // residual = u - (3*u1 - 3*u2 + u3)
        let encoded = encode(&[1, 4, 10, 20, 35], 3, WordWidth::Eight).unwrap();
        assert_eq!(&encoded[2..], &[1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_sixteen_bit_big_endian() {
        let encoded = encode(&[0x01, 0x00, 0x01, 0x05], 1, WordWidth::Sixteen).unwrap();
        assert_eq!(encoded, vec![FORMAT_DELTA2, 1, 0x01, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn test_thirty_two_bit_header_padding() {
        let encoded = encode(&[0, 0, 0, 7, 0, 0, 0, 9], 1, WordWidth::ThirtyTwo).unwrap();
        assert_eq!(encoded, vec![FORMAT_DELTA4, 1, 0, 0, 0, 0, 0, 7, 0, 0, 0, 2]);
    }

    #[test]
    fn test_wrapping_roundtrip() {
        let data = [0xFF, 0xFF, 0x00, 0x00, 0x80, 0x00, 0x7F, 0xFF, 0x00, 0x01, 0xFF, 0xFE];
        for width in WIDTHS {
            for level in 1..=MAX_LEVEL {
                let encoded = encode(&data, level, width).unwrap();
                assert_eq!(decode(&encoded, width).unwrap(), data, "{width:?} level {level}");
            }
        }
    }

    #[test]
    fn test_trailing_partial_word() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        for width in [WordWidth::Sixteen, WordWidth::ThirtyTwo] {
            let encoded = encode(&data, 2, width).unwrap();
            assert_eq!(encoded.last(), Some(&7));
            assert_eq!(decode(&encoded, width).unwrap(), data);
        }
    }

    #[test]
    fn test_empty_is_noop() {
        for width in WIDTHS {
            let encoded = encode(&[], 3, width).unwrap();
            assert_eq!(encoded.len(), header_len(width));
            assert!(decode(&encoded, width).unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(encode(&[1], 0, WordWidth::Eight), Err(ZtrError::Encoding(_))));
        assert!(matches!(encode(&[1], 4, WordWidth::Eight), Err(ZtrError::Encoding(_))));
        assert!(matches!(
            decode(&[FORMAT_DELTA1, 9, 1], WordWidth::Eight),
            Err(ZtrError::Malformed(_))
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(decode(&[FORMAT_DELTA4, 1, 0], WordWidth::ThirtyTwo).is_err());
        assert!(decode(&[FORMAT_DELTA1], WordWidth::Eight).is_err());
    }

    #[test]
    fn test_random_roundtrip() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(0x5A7);
        for _ in 0..50 {
            let len = rng.gen_range(0..300);
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            for width in WIDTHS {
                for level in 1..=MAX_LEVEL {
                    let encoded = encode(&data, level, width).unwrap();
                    assert_eq!(decode(&encoded, width).unwrap(), data);
                }
            }
        }
    }
}
