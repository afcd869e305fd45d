//! Error types for ZTR encoding and decoding.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, ZtrError>;

/// Errors raised while encoding or decoding a ZTR stream.
#[derive(Debug, Error)]
pub enum ZtrError {
    /// The stream does not follow the ZTR layout.
    #[error("Format error in {chunk} at byte {offset}: {msg}")]
    Format {
        /// Chunk tag, or `header` for the file preamble
        chunk: String,
        /// Byte offset of the failing record in the stream
        offset: usize,
        /// Error message
        msg: String,
    },

    /// A transform payload could not be undone. The framer turns this into
    /// [`ZtrError::Format`] once it knows which chunk the payload came from.
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// The chromatogram or the data handed to a transform cannot be encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid pipeline configuration, reported by the builder.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error on the sink or source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZtrError {
    pub(crate) fn format(chunk: impl Into<String>, offset: usize, msg: impl Into<String>) -> Self {
        ZtrError::Format {
            chunk: chunk.into(),
            offset,
            msg: msg.into(),
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ZtrError::Malformed(msg.into())
    }

    /// Attach a chunk location to a payload-level error.
    pub(crate) fn in_chunk(self, chunk: impl Into<String>, offset: usize) -> Self {
        match self {
            ZtrError::Malformed(msg) => ZtrError::format(chunk, offset, msg),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_chunk_locates_malformed() {
        let err = ZtrError::malformed("truncated run-length record").in_chunk("CNF1", 42);
        match err {
            ZtrError::Format { chunk, offset, msg } => {
                assert_eq!(chunk, "CNF1");
                assert_eq!(offset, 42);
                assert_eq!(msg, "truncated run-length record");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_in_chunk_keeps_other_errors() {
        let err = ZtrError::Encoding("too long".into()).in_chunk("BASE", 10);
        assert!(matches!(err, ZtrError::Encoding(_)));
    }

    #[test]
    fn test_format_message() {
        let err = ZtrError::format("SMP4", 10, "truncated chunk payload");
        assert_eq!(err.to_string(), "Format error in SMP4 at byte 10: truncated chunk payload");
    }
}
