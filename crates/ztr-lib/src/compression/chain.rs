//! Ordered composition of transforms.

use super::{Transform, MAX_TRANSFORM_DEPTH};
use crate::error::{Result, ZtrError};

/// An immutable list of transforms. Encoding applies them in order, decoding in
/// reverse order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformChain {
    transforms: Vec<Transform>,
}

impl TransformChain {
    /// Build a chain, checking its length and every transform's parameters.
    pub fn new(transforms: Vec<Transform>) -> Result<Self> {
        if transforms.len() > MAX_TRANSFORM_DEPTH {
            return Err(ZtrError::Configuration(format!(
                "{} transforms in one chain, at most {} can be decoded",
                transforms.len(),
                MAX_TRANSFORM_DEPTH
            )));
        }
        for transform in &transforms {
            transform.validate()?;
        }
        Ok(Self { transforms })
    }

    /// Chain with no transforms: chunk data is stored raw.
    pub fn raw() -> Self {
        Self::default()
    }

    /// For chains assembled from known-good constants.
    pub(crate) fn from_trusted(transforms: &[Transform]) -> Self {
        Self {
            transforms: transforms.to_vec(),
        }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut current = data.to_vec();
        for transform in &self.transforms {
            current = transform.encode(&current)?;
        }
        Ok(current)
    }

    /// Undo exactly the transforms of this chain, outermost first, failing on any other
    /// stack. Pipelines decode through [`unwind`](super::unwind) instead, which accepts
    /// whatever stack the payload's format bytes describe.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut current = data.to_vec();
        for transform in self.transforms.iter().rev() {
            current = transform.decode(&current)?;
        }
        Ok(current)
    }
}

impl std::fmt::Display for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.transforms.is_empty() {
            return f.write_str("raw");
        }
        for (i, transform) in self.transforms.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", transform)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::WordWidth;

    fn sample_chain() -> TransformChain {
        TransformChain::new(vec![
            Transform::Delta { level: 1, width: WordWidth::Eight },
            Transform::RunLength { guard: 77 },
            Transform::Zlib { level: 6 },
        ])
        .unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let chain = sample_chain();
        let data: Vec<u8> = std::iter::once(0).chain(std::iter::repeat(30).take(50)).collect();
        let encoded = chain.encode(&data).unwrap();
        assert_eq!(encoded[0], crate::compression::FORMAT_ZLIB);
        assert_eq!(chain.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_raw_chain_is_identity() {
        let chain = TransformChain::raw();
        assert!(chain.is_empty());
        assert_eq!(chain.encode(&[0, 1, 2]).unwrap(), vec![0, 1, 2]);
        assert_eq!(chain.decode(&[0, 1, 2]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_invalid_transform() {
        let result = TransformChain::new(vec![Transform::Delta {
            level: 5,
            width: WordWidth::Eight,
        }]);
        assert!(matches!(result, Err(ZtrError::Configuration(_))));
    }

    #[test]
    fn test_depth_limit() {
        let result = TransformChain::new(vec![Transform::Follow; MAX_TRANSFORM_DEPTH + 1]);
        assert!(matches!(result, Err(ZtrError::Configuration(_))));

        let chain = TransformChain::new(vec![Transform::Follow; MAX_TRANSFORM_DEPTH]).unwrap();
        let encoded = chain.encode(&[0, 7, 7, 1]).unwrap();
        let (raw, stack) = crate::compression::unwind(&encoded).unwrap();
        assert_eq!(raw, vec![0, 7, 7, 1]);
        assert_eq!(stack.len(), MAX_TRANSFORM_DEPTH);
        assert_eq!(chain.decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn test_decode_detects_mismatched_chain() {
        let encoded = sample_chain().encode(&[0, 1, 2, 3]).unwrap();
        let other = TransformChain::new(vec![Transform::Follow]).unwrap();
        assert!(other.decode(&encoded).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(sample_chain().to_string(), "delta8(1) -> rle(77) -> zlib");
        assert_eq!(TransformChain::raw().to_string(), "raw");
    }
}
