//! Pipeline: six chunk codecs, the builder that configures them and the presets.

use std::io::{Read, Write};

use tracing::debug;

use super::chain::TransformChain;
use super::codecs::ChunkCodec;
use super::{rle, zlib, Transform, WordWidth};
use crate::cli::Preset;
use crate::error::{Result, ZtrError};
use crate::io::chromatogram::Chromatogram;
use crate::io::container::{self, ChunkType, CHUNK_WRITE_ORDER};

const REFERENCE_SAMPLES: [Transform; 5] = [
    Transform::Delta { level: 3, width: WordWidth::Sixteen },
    Transform::Shrink { width: WordWidth::Sixteen },
    Transform::Follow,
    Transform::RunLength { guard: rle::DEFAULT_GUARD },
    Transform::Zlib { level: zlib::DEFAULT_LEVEL },
];
const REFERENCE_BASECALLS: [Transform; 1] = [Transform::Zlib { level: zlib::DEFAULT_LEVEL }];
const REFERENCE_PEAKS: [Transform; 3] = [
    Transform::Delta { level: 1, width: WordWidth::ThirtyTwo },
    Transform::Shrink { width: WordWidth::ThirtyTwo },
    Transform::Zlib { level: zlib::DEFAULT_LEVEL },
];
const REFERENCE_CONFIDENCE: [Transform; 3] = [
    Transform::Delta { level: 1, width: WordWidth::Eight },
    Transform::RunLength { guard: rle::CONFIDENCE_GUARD },
    Transform::Zlib { level: zlib::DEFAULT_LEVEL },
];
const REFERENCE_COMMENTS: [Transform; 1] = [Transform::Zlib { level: zlib::DEFAULT_LEVEL }];

/// Transform stack io_lib applies to each chunk type.
fn reference_chain(chunk: ChunkType) -> &'static [Transform] {
    match chunk {
        ChunkType::Samples => &REFERENCE_SAMPLES,
        ChunkType::Basecalls => &REFERENCE_BASECALLS,
        ChunkType::Peaks => &REFERENCE_PEAKS,
        ChunkType::Confidence => &REFERENCE_CONFIDENCE,
        ChunkType::Comments => &REFERENCE_COMMENTS,
        ChunkType::Clip => &[],
    }
}

/// An immutable ZTR encoder/decoder: one [`ChunkCodec`] per chunk type.
///
/// Holds no mutable state, so one pipeline can be shared across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZtrPipeline {
    /// Indexed by [`ChunkType::index`], i.e. in write order.
    codecs: Vec<ChunkCodec>,
}

impl ZtrPipeline {
    /// The chains io_lib uses, so output compresses like reference-tool files.
    pub fn reference() -> Self {
        Self::from_chains(|chunk| TransformChain::from_trusted(reference_chain(chunk)))
    }

    /// Every chunk stored untransformed.
    pub fn raw() -> Self {
        Self::from_chains(|_| TransformChain::raw())
    }

    pub fn builder() -> ZtrPipelineBuilder {
        ZtrPipelineBuilder::new()
    }

    fn from_chains(mut chain_for: impl FnMut(ChunkType) -> TransformChain) -> Self {
        let codecs = CHUNK_WRITE_ORDER
            .iter()
            .map(|&chunk| ChunkCodec::new(chunk, chain_for(chunk)))
            .collect();
        Self { codecs }
    }

    pub fn codec(&self, chunk: ChunkType) -> &ChunkCodec {
        &self.codecs[chunk.index()]
    }

    /// Codecs in chunk write order.
    pub fn codecs(&self) -> impl Iterator<Item = &ChunkCodec> {
        self.codecs.iter()
    }

    /// Encode a chromatogram into a complete ZTR stream.
    ///
    /// Every chunk type gets a record; empty fields produce zero-length payloads.
    pub fn encode_to_vec(&self, chromatogram: &Chromatogram) -> Result<Vec<u8>> {
        chromatogram.validate()?;

        let mut out = Vec::new();
        container::write_header(&mut out);
        for codec in &self.codecs {
            let payload = codec.encode(chromatogram)?;
            debug!("{}: {} bytes via {}", codec.chunk(), payload.len(), codec.chain());
            container::write_chunk(&mut out, codec.chunk(), &payload)?;
        }
        Ok(out)
    }

    /// Encode into `sink`. Nothing is written if encoding fails.
    pub fn encode<W: Write>(&self, chromatogram: &Chromatogram, mut sink: W) -> Result<()> {
        let bytes = self.encode_to_vec(chromatogram)?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    /// Decode a complete ZTR stream.
    ///
    /// `TEXT` records merge into one comment map; any other repeated chunk replaces the
    /// earlier one. The assembled chromatogram must pass [`Chromatogram::validate`].
    pub fn decode_bytes(&self, data: &[u8]) -> Result<Chromatogram> {
        let mut chromatogram = Chromatogram::default();
        let mut last_offset = container::HEADER_LEN;
        for record in container::read_chunks(data)? {
            let record = record?;
            debug!("{} @{}: {} bytes", record.tag_str(), record.offset, record.payload.len());
            self.codec(record.chunk)
                .decode_into(&record, &mut chromatogram)
                .map_err(|e| e.in_chunk(record.tag_str(), record.offset))?;
            last_offset = record.offset;
        }

        chromatogram
            .validate()
            .map_err(|e| ZtrError::format("chromatogram", last_offset, e.to_string()))?;
        Ok(chromatogram)
    }

    pub fn decode<R: Read>(&self, mut source: R) -> Result<Chromatogram> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        self.decode_bytes(&data)
    }
}

impl Default for ZtrPipeline {
    fn default() -> Self {
        Self::reference()
    }
}

/// Fluent configuration for a [`ZtrPipeline`].
///
/// Select a chunk with [`chunk`](Self::chunk), then list its transforms in encode order:
///
/// ```
/// use ztr_lib::{ChunkType, ZtrPipeline};
///
/// let pipeline = ZtrPipeline::builder()
///     .chunk(ChunkType::Samples).delta16(3).shrink16().follow().run_length(150).zlib()
///     .chunk(ChunkType::Confidence).delta8(1).run_length(77).zlib()
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.codec(ChunkType::Samples).chain().len(), 5);
/// ```
///
/// Invalid arguments are collected and reported together by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ZtrPipelineBuilder {
    chains: Vec<Vec<Transform>>,
    current: Option<ChunkType>,
    zlib_level: Option<u32>,
    errors: Vec<String>,
}

impl Default for ZtrPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZtrPipelineBuilder {
    /// Every chunk raw until configured.
    pub fn new() -> Self {
        Self {
            chains: vec![Vec::new(); CHUNK_WRITE_ORDER.len()],
            current: None,
            zlib_level: None,
            errors: Vec::new(),
        }
    }

    /// Start from a preset's chains.
    pub fn from_preset(preset: Preset) -> Self {
        let mut builder = Self::new();
        if let Preset::Reference = preset {
            for chunk in CHUNK_WRITE_ORDER {
                builder.chains[chunk.index()] = reference_chain(chunk).to_vec();
            }
        }
        builder
    }

    /// Select the chunk the following transform calls apply to. Its chain starts empty.
    pub fn chunk(mut self, chunk: ChunkType) -> Self {
        self.chains[chunk.index()].clear();
        self.current = Some(chunk);
        self
    }

    /// Install a pre-built chain for `chunk`.
    pub fn chain(mut self, chunk: ChunkType, chain: TransformChain) -> Self {
        self.chains[chunk.index()] = chain.transforms().to_vec();
        self
    }

    /// Append a transform to the selected chunk's chain.
    pub fn transform(mut self, transform: Transform) -> Self {
        match self.current {
            Some(chunk) => self.chains[chunk.index()].push(transform),
            None => self
                .errors
                .push(format!("{} added before a chunk was selected", transform)),
        }
        self
    }

    pub fn delta8(self, level: u8) -> Self {
        self.transform(Transform::Delta { level, width: WordWidth::Eight })
    }

    pub fn delta16(self, level: u8) -> Self {
        self.transform(Transform::Delta { level, width: WordWidth::Sixteen })
    }

    pub fn delta32(self, level: u8) -> Self {
        self.transform(Transform::Delta { level, width: WordWidth::ThirtyTwo })
    }

    pub fn run_length(self, guard: u8) -> Self {
        self.transform(Transform::RunLength { guard })
    }

    pub fn run_length_default(self) -> Self {
        self.run_length(rle::DEFAULT_GUARD)
    }

    pub fn shrink16(self) -> Self {
        self.transform(Transform::Shrink { width: WordWidth::Sixteen })
    }

    pub fn shrink32(self) -> Self {
        self.transform(Transform::Shrink { width: WordWidth::ThirtyTwo })
    }

    pub fn follow(self) -> Self {
        self.transform(Transform::Follow)
    }

    pub fn zlib(self) -> Self {
        self.zlib_level(zlib::DEFAULT_LEVEL)
    }

    pub fn zlib_level(self, level: u32) -> Self {
        self.transform(Transform::Zlib { level })
    }

    /// Use `level` for every zlib stage, including those set by a preset.
    pub fn override_zlib_level(mut self, level: u32) -> Self {
        self.zlib_level = Some(level);
        self
    }

    /// Check every transform and freeze the pipeline.
    pub fn build(self) -> Result<ZtrPipeline> {
        if !self.errors.is_empty() {
            return Err(ZtrError::Configuration(self.errors.join("; ")));
        }

        let zlib_level = self.zlib_level;
        let mut chains = Vec::with_capacity(self.chains.len());
        for (chunk, transforms) in CHUNK_WRITE_ORDER.iter().zip(self.chains) {
            let transforms = transforms
                .into_iter()
                .map(|transform| match (transform, zlib_level) {
                    (Transform::Zlib { .. }, Some(level)) => Transform::Zlib { level },
                    _ => transform,
                })
                .collect();
            let chain = TransformChain::new(transforms).map_err(|e| match e {
                ZtrError::Configuration(msg) => {
                    ZtrError::Configuration(format!("{}: {}", chunk, msg))
                }
                other => other,
            })?;
            chains.push(chain);
        }

        let mut chains = chains.into_iter();
        Ok(ZtrPipeline::from_chains(|_| chains.next().unwrap_or_default()))
    }
}
