//! Chunk codecs: each chromatogram field to and from its canonical raw layout.
//!
//! Raw layouts (the leading 0 is the raw format byte):
//!
//! | Chunk | Layout |
//! |-------|--------|
//! | SMP4  | `0 0`, then all A, all C, all G, all T samples as u16 BE |
//! | BASE  | `0`, one ASCII byte per call |
//! | BPOS  | `0 0 0 0`, one u32 BE peak position per call |
//! | CNF1  | `0`, one confidence byte per call |
//! | TEXT  | `0`, `key=value\n` per comment in key order, `\0` |
//! | CLIP  | `0`, left u32 BE, right u32 BE |
//!
//! An empty field is written as an empty payload, with no transforms applied.

use std::collections::BTreeMap;

use super::chain::TransformChain;
use super::{unwind, FORMAT_RAW};
use crate::error::{Result, ZtrError};
use crate::io::chromatogram::{Channels, Chromatogram, ClipRange};
use crate::io::container::{ChunkRecord, ChunkType, CNF4_TAG};

const SAMPLES_HEADER: usize = 2;
const PEAKS_HEADER: usize = 4;
const CLIP_LEN: usize = 8;

/// One chromatogram field and the transform chain its payload is encoded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCodec {
    chunk: ChunkType,
    chain: TransformChain,
}

impl ChunkCodec {
    pub fn new(chunk: ChunkType, chain: TransformChain) -> Self {
        Self { chunk, chain }
    }

    pub fn chunk(&self) -> ChunkType {
        self.chunk
    }

    pub fn chain(&self) -> &TransformChain {
        &self.chain
    }

    /// Extract this codec's field and run the chain forward over it.
    pub fn encode(&self, chromatogram: &Chromatogram) -> Result<Vec<u8>> {
        match raw_layout(self.chunk, chromatogram)? {
            Some(raw) => self.chain.encode(&raw),
            None => Ok(Vec::new()),
        }
    }

    /// Decode a record's payload into the matching field of `chromatogram`.
    ///
    /// The transforms are read from the payload's format bytes rather than from this
    /// codec's chain, so payloads written with any other chain (such as the reference
    /// tool's) decode as well.
    pub fn decode_into(
        &self,
        record: &ChunkRecord<'_>,
        chromatogram: &mut Chromatogram,
    ) -> Result<()> {
        if record.chunk != self.chunk {
            return Err(ZtrError::malformed(format!(
                "{} record handed to the {} codec",
                record.chunk, self.chunk
            )));
        }
        if record.payload.is_empty() {
            return Ok(());
        }

        let (raw, _) = unwind(record.payload)?;
        match self.chunk {
            ChunkType::Samples => chromatogram.channels = raw_to_samples(&raw)?,
            ChunkType::Basecalls => chromatogram.basecalls = strip_raw_header(&raw, 1)?.to_vec(),
            ChunkType::Peaks => chromatogram.peaks = raw_to_peaks(&raw)?,
            ChunkType::Confidence => {
                chromatogram.confidence = raw_to_confidence(&raw, record.tag == CNF4_TAG)?
            }
            ChunkType::Comments => {
                let text = strip_raw_header(&raw, 1)?;
                chromatogram.comments.extend(text_to_comments(text)?);
            }
            ChunkType::Clip => chromatogram.clip = Some(raw_to_clip(&raw)?),
        }
        Ok(())
    }
}

/// Canonical raw layout of one field, or `None` when the field is empty.
pub fn raw_layout(chunk: ChunkType, chromatogram: &Chromatogram) -> Result<Option<Vec<u8>>> {
    let raw = match chunk {
        ChunkType::Samples if chromatogram.channels.is_empty() => None,
        ChunkType::Samples => Some(samples_to_raw(&chromatogram.channels)),
        ChunkType::Basecalls if chromatogram.basecalls.is_empty() => None,
        ChunkType::Basecalls => Some(with_raw_header(1, &chromatogram.basecalls)),
        ChunkType::Peaks if chromatogram.peaks.is_empty() => None,
        ChunkType::Peaks => Some(peaks_to_raw(&chromatogram.peaks)),
        ChunkType::Confidence if chromatogram.confidence.is_empty() => None,
        ChunkType::Confidence => Some(with_raw_header(1, &chromatogram.confidence)),
        ChunkType::Comments if chromatogram.comments.is_empty() => None,
        ChunkType::Comments => Some(with_raw_header(1, &comments_to_text(&chromatogram.comments)?)),
        ChunkType::Clip => chromatogram.clip.map(clip_to_raw),
    };
    Ok(raw)
}

/// Raw format byte plus padding, followed by `body`.
fn with_raw_header(header_len: usize, body: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(header_len + body.len());
    raw.push(FORMAT_RAW);
    raw.resize(header_len, 0);
    raw.extend_from_slice(body);
    raw
}

fn strip_raw_header(raw: &[u8], header_len: usize) -> Result<&[u8]> {
    match raw.first() {
        Some(&FORMAT_RAW) if raw.len() >= header_len => Ok(&raw[header_len..]),
        Some(&FORMAT_RAW) => Err(ZtrError::malformed(format!(
            "raw data of {} bytes is shorter than its {}-byte header",
            raw.len(),
            header_len
        ))),
        _ => Err(ZtrError::malformed("raw data does not start with format 0")),
    }
}

pub fn samples_to_raw(channels: &Channels) -> Vec<u8> {
    let mut raw = Vec::with_capacity(SAMPLES_HEADER + channels.len() * 8);
    raw.push(FORMAT_RAW);
    raw.push(0);
    for channel in channels.iter() {
        for sample in channel {
            raw.extend_from_slice(&sample.to_be_bytes());
        }
    }
    raw
}

pub fn raw_to_samples(raw: &[u8]) -> Result<Channels> {
    let body = strip_raw_header(raw, SAMPLES_HEADER)?;
    if body.len() % 8 != 0 {
        return Err(ZtrError::malformed(format!(
            "{} sample bytes do not split into four 16-bit channels",
            body.len()
        )));
    }
    let per_channel = body.len() / 8;
    let channel = |i: usize| {
        body[i * per_channel * 2..(i + 1) * per_channel * 2]
            .chunks_exact(2)
            .map(|s| u16::from_be_bytes([s[0], s[1]]))
            .collect::<Vec<_>>()
    };
    Ok(Channels::new(channel(0), channel(1), channel(2), channel(3)))
}

pub fn peaks_to_raw(peaks: &[u32]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(PEAKS_HEADER + peaks.len() * 4);
    raw.resize(PEAKS_HEADER, 0);
    raw[0] = FORMAT_RAW;
    for peak in peaks {
        raw.extend_from_slice(&peak.to_be_bytes());
    }
    raw
}

pub fn raw_to_peaks(raw: &[u8]) -> Result<Vec<u32>> {
    let body = strip_raw_header(raw, PEAKS_HEADER)?;
    if body.len() % 4 != 0 {
        return Err(ZtrError::malformed(format!(
            "{} peak bytes are not a whole number of 32-bit positions",
            body.len()
        )));
    }
    Ok(body
        .chunks_exact(4)
        .map(|p| u32::from_be_bytes([p[0], p[1], p[2], p[3]]))
        .collect())
}

/// CNF1 holds one value per call. CNF4 holds the called base's value for every call
/// followed by the three other bases' values; only the first block is kept.
pub fn raw_to_confidence(raw: &[u8], four_per_call: bool) -> Result<Vec<u8>> {
    let body = strip_raw_header(raw, 1)?;
    if !four_per_call {
        return Ok(body.to_vec());
    }
    if body.len() % 4 != 0 {
        return Err(ZtrError::malformed(format!(
            "{} CNF4 bytes are not four values per call",
            body.len()
        )));
    }
    Ok(body[..body.len() / 4].to_vec())
}

/// Canonical comment text: `key=value\n` per entry in key order, then one NUL.
pub fn comments_to_text(comments: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let mut text = Vec::new();
    for (key, value) in comments {
        if key.contains(|c: char| matches!(c, '=' | '\n' | '\0')) {
            return Err(ZtrError::Encoding(format!(
                "comment key {:?} contains '=', a newline or NUL",
                key
            )));
        }
        if value.contains(|c: char| matches!(c, '\n' | '\0')) {
            return Err(ZtrError::Encoding(format!(
                "comment value for {:?} contains a newline or NUL",
                key
            )));
        }
        text.extend_from_slice(key.as_bytes());
        text.push(b'=');
        text.extend_from_slice(value.as_bytes());
        text.push(b'\n');
    }
    text.push(0);
    Ok(text)
}

/// Parse comment text. Accepts the `key=value\n` form written by this codec and the
/// NUL-separated `key\0value\0...\0` form of other ZTR writers.
pub fn text_to_comments(text: &[u8]) -> Result<BTreeMap<String, String>> {
    let end = text.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = &text[..end];
    let mut comments = BTreeMap::new();

    if text.contains(&0) {
        // Trailing NULs were trimmed, so an odd field count means the last value is empty.
        let mut fields = text.split(|&b| b == 0);
        while let Some(key) = fields.next() {
            comments.insert(lossy(key), fields.next().map(lossy).unwrap_or_default());
        }
        return Ok(comments);
    }

    for line in text.split(|&b| b == b'\n').filter(|line| !line.is_empty()) {
        match line.iter().position(|&b| b == b'=') {
            Some(eq) => comments.insert(lossy(&line[..eq]), lossy(&line[eq + 1..])),
            None => comments.insert(lossy(line), String::new()),
        };
    }
    Ok(comments)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn clip_to_raw(clip: ClipRange) -> Vec<u8> {
    let mut raw = Vec::with_capacity(1 + CLIP_LEN);
    raw.push(FORMAT_RAW);
    raw.extend_from_slice(&clip.left.to_be_bytes());
    raw.extend_from_slice(&clip.right.to_be_bytes());
    raw
}

pub fn raw_to_clip(raw: &[u8]) -> Result<ClipRange> {
    let body = strip_raw_header(raw, 1)?;
    if body.len() != CLIP_LEN {
        return Err(ZtrError::malformed(format!(
            "clip points need {} bytes, found {}",
            CLIP_LEN,
            body.len()
        )));
    }
    Ok(ClipRange {
        left: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
        right: u32::from_be_bytes([body[4], body[5], body[6], body[7]]),
    })
}
