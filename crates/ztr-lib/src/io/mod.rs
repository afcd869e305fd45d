pub mod chromatogram;
pub mod container;

pub use chromatogram::{Channels, Chromatogram, ClipRange};
pub use container::{ChunkRecord, ChunkRecords, ChunkType, CHUNK_WRITE_ORDER};
