//! ZTR container framing: magic, version and chunk records.
//!
//! ```text
//! [8-byte magic][major=1][minor=2]
//! repeat:
//!   [4-byte ASCII tag][4-byte BE metadata length = 0][4-byte BE payload length N][N bytes]
//! ```

use std::fmt;

use crate::error::{Result, ZtrError};

/// ZTR file magic (`\256ZTR\r\n\032\n`).
pub const ZTR_MAGIC: [u8; 8] = [0xAE, b'Z', b'T', b'R', 0x0D, 0x0A, 0x1A, 0x0A];
pub const ZTR_VERSION_MAJOR: u8 = 1;
pub const ZTR_VERSION_MINOR: u8 = 2;
/// Size of magic + version.
pub const HEADER_LEN: usize = ZTR_MAGIC.len() + 2;
/// Size of tag + metadata length + payload length.
pub const CHUNK_HEADER_LEN: usize = 12;

/// Four confidence values per call, the reference tool's default confidence chunk.
/// Decoded into [`ChunkType::Confidence`]; never written.
pub const CNF4_TAG: [u8; 4] = *b"CNF4";

/// The fixed set of chunk types this codec reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkType {
    /// SMP4: the four sample channels
    Samples,
    /// BASE: basecalls
    Basecalls,
    /// BPOS: peak position of each call
    Peaks,
    /// CNF1: one confidence value per call
    Confidence,
    /// TEXT: comments
    Comments,
    /// CLIP: clip points
    Clip,
}

/// Chunk write order.
///
/// Readers of the reference tool interpret BPOS and CNF4 against the basecalls and the
/// samples that precede them, so SMP4 and BASE must come first. Do not reorder: files
/// written in another order are not read back correctly by other ZTR implementations.
pub const CHUNK_WRITE_ORDER: [ChunkType; 6] = [
    ChunkType::Samples,
    ChunkType::Basecalls,
    ChunkType::Peaks,
    ChunkType::Confidence,
    ChunkType::Comments,
    ChunkType::Clip,
];

impl ChunkType {
    pub fn tag(self) -> [u8; 4] {
        match self {
            ChunkType::Samples => *b"SMP4",
            ChunkType::Basecalls => *b"BASE",
            ChunkType::Peaks => *b"BPOS",
            ChunkType::Confidence => *b"CNF1",
            ChunkType::Comments => *b"TEXT",
            ChunkType::Clip => *b"CLIP",
        }
    }

    /// Map a tag read from a stream to its chunk type. `CNF4` maps to
    /// [`ChunkType::Confidence`].
    pub fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"SMP4" => Some(ChunkType::Samples),
            b"BASE" => Some(ChunkType::Basecalls),
            b"BPOS" => Some(ChunkType::Peaks),
            b"CNF1" | b"CNF4" => Some(ChunkType::Confidence),
            b"TEXT" => Some(ChunkType::Comments),
            b"CLIP" => Some(ChunkType::Clip),
            _ => None,
        }
    }

    /// Position in [`CHUNK_WRITE_ORDER`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.tag()))
    }
}

/// One chunk record borrowed from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRecord<'a> {
    pub chunk: ChunkType,
    /// Tag as stored, which differs from `chunk.tag()` for `CNF4`.
    pub tag: [u8; 4],
    /// Byte offset of the record header in the stream.
    pub offset: usize,
    pub payload: &'a [u8],
}

impl ChunkRecord<'_> {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

pub fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(&ZTR_MAGIC);
    out.push(ZTR_VERSION_MAJOR);
    out.push(ZTR_VERSION_MINOR);
}

/// Append one chunk record. Metadata is always empty.
pub fn write_chunk(out: &mut Vec<u8>, chunk: ChunkType, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        ZtrError::Encoding(format!(
            "{} payload of {} bytes exceeds the 4 GiB chunk limit",
            chunk,
            payload.len()
        ))
    })?;
    out.extend_from_slice(&chunk.tag());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Check magic and version and return the offset of the first chunk record.
///
/// Versions 1.0 through 1.2 share the chunk layout and are accepted.
pub fn read_header(data: &[u8]) -> Result<usize> {
    if data.len() < HEADER_LEN {
        return Err(ZtrError::format(
            "header",
            0,
            format!("stream too short for ZTR header ({} bytes)", data.len()),
        ));
    }
    if data[..ZTR_MAGIC.len()] != ZTR_MAGIC {
        return Err(ZtrError::format("header", 0, "bad ZTR magic number"));
    }
    let major = data[ZTR_MAGIC.len()];
    let minor = data[ZTR_MAGIC.len() + 1];
    if major != ZTR_VERSION_MAJOR || minor > ZTR_VERSION_MINOR {
        return Err(ZtrError::format(
            "header",
            ZTR_MAGIC.len(),
            format!("unsupported ZTR version {}.{}", major, minor),
        ));
    }
    Ok(HEADER_LEN)
}

/// Iterate over the chunk records of a complete ZTR stream (header included).
pub fn read_chunks(data: &[u8]) -> Result<ChunkRecords<'_>> {
    let offset = read_header(data)?;
    Ok(ChunkRecords {
        data,
        offset,
        failed: false,
    })
}

/// Iterator over chunk records. Stops after the first error.
#[derive(Debug, Clone)]
pub struct ChunkRecords<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> ChunkRecords<'a> {
    fn read_record(&mut self) -> Result<ChunkRecord<'a>> {
        let start = self.offset;
        let remaining = &self.data[start..];
        if remaining.len() < CHUNK_HEADER_LEN {
            let tag = if remaining.len() >= 4 {
                String::from_utf8_lossy(&remaining[..4]).into_owned()
            } else {
                "chunk header".to_string()
            };
            return Err(ZtrError::format(
                tag,
                start,
                format!(
                    "truncated chunk header: {} of {} bytes",
                    remaining.len(),
                    CHUNK_HEADER_LEN
                ),
            ));
        }

        let tag = [remaining[0], remaining[1], remaining[2], remaining[3]];
        let tag_str = String::from_utf8_lossy(&tag).into_owned();
        let chunk = ChunkType::from_tag(tag)
            .ok_or_else(|| ZtrError::format(tag_str.as_str(), start, "unknown chunk type"))?;

        let meta_len = be_u32(&remaining[4..8]);
        if meta_len != 0 {
            return Err(ZtrError::format(
                tag_str,
                start,
                format!("unexpected metadata of {} bytes", meta_len),
            ));
        }

        let payload_len = be_u32(&remaining[8..12]) as usize;
        let payload = remaining[CHUNK_HEADER_LEN..]
            .get(..payload_len)
            .ok_or_else(|| {
                ZtrError::format(
                    tag_str.as_str(),
                    start,
                    format!(
                        "truncated chunk payload: {} of {} bytes",
                        remaining.len() - CHUNK_HEADER_LEN,
                        payload_len
                    ),
                )
            })?;

        self.offset = start + CHUNK_HEADER_LEN + payload_len;
        Ok(ChunkRecord {
            chunk,
            tag,
            offset: start,
            payload,
        })
    }
}

impl<'a> Iterator for ChunkRecords<'a> {
    type Item = Result<ChunkRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        let record = self.read_record();
        if record.is_err() {
            self.failed = true;
        }
        Some(record)
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with(records: &[(&[u8; 4], u32, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out);
        for (tag, meta, payload) in records {
            out.extend_from_slice(*tag);
            out.extend_from_slice(&meta.to_be_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            out.extend_from_slice(payload);
        }
        out
    }

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        write_header(&mut out);
        assert_eq!(out, [0xAE, b'Z', b'T', b'R', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2]);
        assert_eq!(read_header(&out).unwrap(), HEADER_LEN);
    }

    #[test]
    fn test_write_chunk_layout() {
        let mut out = Vec::new();
        write_chunk(&mut out, ChunkType::Basecalls, &[0, b'A', b'C']).unwrap();
        assert_eq!(out, b"BASE\0\0\0\0\0\0\0\x03\0AC");
    }

    #[test]
    fn test_read_chunks() {
        let data = stream_with(&[(b"BASE", 0, &[0, b'A'][..]), (b"CNF4", 0, &[0, 1, 2, 3, 4][..])]);
        let records: Vec<_> = read_chunks(&data).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chunk, ChunkType::Basecalls);
        assert_eq!(records[0].offset, HEADER_LEN);
        assert_eq!(records[0].payload, &[0, b'A']);
        assert_eq!(records[1].chunk, ChunkType::Confidence);
        assert_eq!(records[1].tag, CNF4_TAG);
        assert_eq!(records[1].offset, HEADER_LEN + CHUNK_HEADER_LEN + 2);
    }

    #[test]
    fn test_empty_body() {
        let data = stream_with(&[]);
        assert_eq!(read_chunks(&data).unwrap().count(), 0);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = stream_with(&[]);
        data[1] = b'X';
        assert!(matches!(read_header(&data), Err(ZtrError::Format { offset: 0, .. })));
    }

    #[test]
    fn test_version_check() {
        let mut data = stream_with(&[]);
        data[9] = 1;
        assert!(read_header(&data).is_ok());
        data[9] = 3;
        assert!(read_header(&data).is_err());
        data[8] = 2;
        data[9] = 0;
        assert!(read_header(&data).is_err());
    }

    #[test]
    fn test_short_header() {
        assert!(read_header(&ZTR_MAGIC).is_err());
    }

    #[test]
    fn test_unknown_tag() {
        let data = stream_with(&[(b"XXXX", 0, &[0][..])]);
        let err = read_chunks(&data).unwrap().next().unwrap().unwrap_err();
        match err {
            ZtrError::Format { chunk, offset, .. } => {
                assert_eq!(chunk, "XXXX");
                assert_eq!(offset, HEADER_LEN);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_metadata() {
        let data = stream_with(&[(b"SMP4", 4, &[0, 0][..])]);
        let result: Result<Vec<_>> = read_chunks(&data).unwrap().collect();
        assert!(matches!(result, Err(ZtrError::Format { .. })));
    }

    #[test]
    fn test_truncated_payload() {
        let mut data = stream_with(&[(b"BASE", 0, &[0, b'A'][..]), (b"CLIP", 0, &[0; 9][..])]);
        data.truncate(data.len() - 3);
        let mut records = read_chunks(&data).unwrap();
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        match err {
            ZtrError::Format { chunk, offset, .. } => {
                assert_eq!(chunk, "CLIP");
                assert_eq!(offset, HEADER_LEN + CHUNK_HEADER_LEN + 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(records.next().is_none());
    }

    #[test]
    fn test_truncated_header() {
        let mut data = stream_with(&[(b"BASE", 0, &[0][..])]);
        data.extend_from_slice(b"TEX");
        let result: Result<Vec<_>> = read_chunks(&data).unwrap().collect();
        assert!(matches!(result, Err(ZtrError::Format { .. })));
    }

    #[test]
    fn test_write_order_indices() {
        for (i, chunk) in CHUNK_WRITE_ORDER.iter().enumerate() {
            assert_eq!(chunk.index(), i);
            assert_eq!(ChunkType::from_tag(chunk.tag()), Some(*chunk));
        }
    }
}
