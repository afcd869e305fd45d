//! Shrink 16- or 32-bit words to one byte (formats 70 and 71).
//!
//! Each big-endian signed word in `-127..=127` is stored as a single byte. Any other
//! value is stored as the sentinel `0x80` followed by the original word, inline and in
//! encounter order. `-128` would narrow to the sentinel itself, so it always takes the
//! escaped form.
//!
//! A trailing partial word is stored as the sentinel followed by the leftover bytes;
//! it is recognised on decode because fewer than a full word's bytes follow.

use super::{WordWidth, FORMAT_16TO8, FORMAT_32TO8};
use crate::error::{Result, ZtrError};

/// Escape marker in the narrowed stream.
pub const SENTINEL: u8 = 0x80;

const NARROW_RANGE: std::ops::RangeInclusive<i32> = -127..=127;

fn format_for(width: WordWidth) -> Result<u8> {
    match width {
        WordWidth::Sixteen => Ok(FORMAT_16TO8),
        WordWidth::ThirtyTwo => Ok(FORMAT_32TO8),
        WordWidth::Eight => Err(ZtrError::Encoding(
            "shrink needs 16- or 32-bit words".to_string(),
        )),
    }
}

pub fn encode(data: &[u8], width: WordWidth) -> Result<Vec<u8>> {
    let format = format_for(width)?;
    let chunks = data.chunks_exact(width.bytes());
    let tail = chunks.remainder();

    let mut out = Vec::with_capacity(1 + data.len() / width.bytes() + tail.len() + 1);
    out.push(format);
    for word in chunks {
        let value = width.signed(width.read(word));
        if NARROW_RANGE.contains(&value) {
            out.push(value as i8 as u8);
        } else {
            out.push(SENTINEL);
            out.extend_from_slice(word);
        }
    }
    if !tail.is_empty() {
        out.push(SENTINEL);
        out.extend_from_slice(tail);
    }
    Ok(out)
}

pub fn decode(data: &[u8], width: WordWidth) -> Result<Vec<u8>> {
    let format = format_for(width).map_err(|e| ZtrError::malformed(e.to_string()))?;
    match data.first() {
        Some(&f) if f == format => {}
        found => {
            return Err(ZtrError::malformed(format!(
                "expected shrink format {}, found {:?}",
                format, found
            )))
        }
    }

    let word_len = width.bytes();
    let mut out = Vec::with_capacity((data.len() - 1) * word_len);
    let mut i = 1;
    while i < data.len() {
        let byte = data[i];
        i += 1;
        if byte != SENTINEL {
            width.write(byte as i8 as i32 as u32, &mut out);
            continue;
        }

        let remaining = data.len() - i;
        if remaining == 0 {
            return Err(ZtrError::malformed(format!(
                "sentinel at byte {} has no escaped value",
                i - 1
            )));
        }
        let take = remaining.min(word_len);
        out.extend_from_slice(&data[i..i + take]);
        i += take;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn words32(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn test_small_values_narrow() {
        let data = words16(&[0, 1, -1, 127, -127]);
        let encoded = encode(&data, WordWidth::Sixteen).unwrap();
        assert_eq!(encoded, vec![FORMAT_16TO8, 0, 1, 0xFF, 127, 0x81]);
        assert_eq!(decode(&encoded, WordWidth::Sixteen).unwrap(), data);
    }

    #[test]
    fn test_boundary_values() {
        let data = words16(&[127, 128, 255, 256, -127, -128, -129, i16::MAX, i16::MIN]);
        let encoded = encode(&data, WordWidth::Sixteen).unwrap();
        assert_eq!(&encoded[1..3], &[127, SENTINEL]);
        assert_eq!(decode(&encoded, WordWidth::Sixteen).unwrap(), data);
    }

    #[test]
    fn test_sentinel_collision_escaped() {
        // -128 narrows to 0x80, the sentinel itself
        let data = words16(&[-128]);
        let encoded = encode(&data, WordWidth::Sixteen).unwrap();
        assert_eq!(encoded, vec![FORMAT_16TO8, SENTINEL, 0xFF, 0x80]);
        assert_eq!(decode(&encoded, WordWidth::Sixteen).unwrap(), data);
    }

    #[test]
    fn test_thirty_two_bit() {
        let data = words32(&[5, -5, 1000, -128, 70_000, i32::MIN]);
        let encoded = encode(&data, WordWidth::ThirtyTwo).unwrap();
        assert_eq!(encoded[0], FORMAT_32TO8);
        assert_eq!(&encoded[1..4], &[5, 0xFB, SENTINEL]);
        assert_eq!(&encoded[4..8], &1000i32.to_be_bytes());
        assert_eq!(decode(&encoded, WordWidth::ThirtyTwo).unwrap(), data);
    }

    #[test]
    fn test_trailing_partial_word() {
        let mut data = words16(&[3, 400]);
        data.push(9);
        let encoded = encode(&data, WordWidth::Sixteen).unwrap();
        assert_eq!(encoded.last(), Some(&9));
        assert_eq!(decode(&encoded, WordWidth::Sixteen).unwrap(), data);

        let data = vec![0, 0, 0, 1, 0xAB, 0xCD];
        let encoded = encode(&data, WordWidth::ThirtyTwo).unwrap();
        assert_eq!(decode(&encoded, WordWidth::ThirtyTwo).unwrap(), data);
    }

    #[test]
    fn test_empty() {
        let encoded = encode(&[], WordWidth::Sixteen).unwrap();
        assert_eq!(encoded, vec![FORMAT_16TO8]);
        assert!(decode(&encoded, WordWidth::Sixteen).unwrap().is_empty());
    }

    #[test]
    fn test_short_escape_at_end_is_partial_word() {
        // fewer than a full word after the last sentinel: the leftover of an odd-length input
        let payload = [FORMAT_32TO8, 2, SENTINEL, 0xAB, 0xCD];
        let decoded = decode(&payload, WordWidth::ThirtyTwo).unwrap();
        assert_eq!(decoded, vec![0, 0, 0, 2, 0xAB, 0xCD]);
        assert_eq!(encode(&decoded, WordWidth::ThirtyTwo).unwrap().len(), 5);
    }

    #[test]
    fn test_dangling_sentinel_is_error() {
        assert!(matches!(
            decode(&[FORMAT_16TO8, 4, SENTINEL], WordWidth::Sixteen),
            Err(ZtrError::Malformed(_))
        ));
    }

    #[test]
    fn test_eight_bit_rejected() {
        assert!(matches!(encode(&[1, 2], WordWidth::Eight), Err(ZtrError::Encoding(_))));
    }

    #[test]
    fn test_wrong_format() {
        assert!(decode(&[FORMAT_32TO8, 1], WordWidth::Sixteen).is_err());
        assert!(decode(&[], WordWidth::Sixteen).is_err());
    }
}
