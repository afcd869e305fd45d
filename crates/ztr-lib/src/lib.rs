//! ZTR 1.2 trace chromatogram codec.
//!
//! A chromatogram (basecalls, confidence, four sample channels, peak positions,
//! comments and clip points) is split into six chunks. Each chunk is converted to its
//! canonical raw layout and pushed through a configurable chain of reversible
//! transforms (delta, run-length, shrink, follow, zlib) before being framed into the
//! ZTR container.
//!
//! ```no_run
//! use ztr_lib::{Chromatogram, ZtrPipeline};
//!
//! # fn main() -> ztr_lib::Result<()> {
//! let pipeline = ZtrPipeline::reference();
//! let chromatogram = Chromatogram::default();
//! let bytes = pipeline.encode_to_vec(&chromatogram)?;
//! assert_eq!(pipeline.decode_bytes(&bytes)?, chromatogram);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod compression;
pub mod error;
pub mod io;

pub use compression::chain::TransformChain;
pub use compression::codecs::ChunkCodec;
pub use compression::pipeline::{ZtrPipeline, ZtrPipelineBuilder};
pub use compression::{Transform, WordWidth};
pub use error::{Result, ZtrError};
pub use io::chromatogram::{Channels, Chromatogram, ClipRange};
pub use io::container::{ChunkRecord, ChunkType, CHUNK_WRITE_ORDER};
