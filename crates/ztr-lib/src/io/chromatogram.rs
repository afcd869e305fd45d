//! In-memory chromatogram model.
//!
//! Built once by an upstream parser (SCF, ABI, an assembler) and only read by the
//! codec. Decoding produces a fresh value.

use std::collections::BTreeMap;

use crate::error::{Result, ZtrError};

/// The four sample-intensity traces, one per base type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channels {
    pub a: Vec<u16>,
    pub c: Vec<u16>,
    pub g: Vec<u16>,
    pub t: Vec<u16>,
}

impl Channels {
    pub fn new(a: Vec<u16>, c: Vec<u16>, g: Vec<u16>, t: Vec<u16>) -> Self {
        Self { a, c, g, t }
    }

    /// Number of samples per channel (channels are equal length once validated).
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().all(|channel| channel.is_empty())
    }

    /// Channels in A, C, G, T order, the order SMP4 stores them in.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<u16>> {
        [&self.a, &self.c, &self.g, &self.t].into_iter()
    }
}

/// Vendor or pipeline assigned quality/vector boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRange {
    pub left: u32,
    pub right: u32,
}

/// A sequencing trace: basecalls with per-base confidence and peak position, the
/// sample traces the peaks index into, free-text comments and an optional clip range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chromatogram {
    /// One ASCII symbol per call (`ACGT`, `N`, IUPAC ambiguity codes, `-`).
    pub basecalls: Vec<u8>,
    /// Phred-style confidence, one per call.
    pub confidence: Vec<u8>,
    pub channels: Channels,
    /// Sample index of each call's peak.
    pub peaks: Vec<u32>,
    /// Sorted so that equal maps always encode to equal bytes.
    pub comments: BTreeMap<String, String>,
    pub clip: Option<ClipRange>,
}

impl Chromatogram {
    pub fn new(
        basecalls: Vec<u8>,
        confidence: Vec<u8>,
        channels: Channels,
        peaks: Vec<u32>,
    ) -> Self {
        Self {
            basecalls,
            confidence,
            channels,
            peaks,
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.comments.insert(key.into(), value.into());
        self
    }

    pub fn with_clip(mut self, left: u32, right: u32) -> Self {
        self.clip = Some(ClipRange { left, right });
        self
    }

    /// Number of basecalls.
    pub fn len(&self) -> usize {
        self.basecalls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basecalls.is_empty()
    }

    /// Check the cross-field invariants the ZTR layout relies on.
    ///
    /// Peaks are only bounds-checked against the channels when sample data is present,
    /// since basecall-only traces carry peaks without samples.
    pub fn validate(&self) -> Result<()> {
        let calls = self.basecalls.len();
        if self.confidence.len() != calls {
            return Err(ZtrError::Encoding(format!(
                "{} confidence values for {} basecalls",
                self.confidence.len(),
                calls
            )));
        }
        if self.peaks.len() != calls {
            return Err(ZtrError::Encoding(format!(
                "{} peak positions for {} basecalls",
                self.peaks.len(),
                calls
            )));
        }

        let samples = self.channels.a.len();
        for (name, channel) in ['A', 'C', 'G', 'T'].iter().zip(self.channels.iter()) {
            if channel.len() != samples {
                return Err(ZtrError::Encoding(format!(
                    "channel {} has {} samples, channel A has {}",
                    name,
                    channel.len(),
                    samples
                )));
            }
        }

        if let Some(i) = self.peaks.windows(2).position(|w| w[1] < w[0]) {
            return Err(ZtrError::Encoding(format!(
                "peak positions decrease at call {} ({} -> {})",
                i + 1,
                self.peaks[i],
                self.peaks[i + 1]
            )));
        }
        if samples > 0 {
            if let Some(&last) = self.peaks.last() {
                if last as usize >= samples {
                    return Err(ZtrError::Encoding(format!(
                        "peak position {} outside {} samples",
                        last, samples
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chromatogram() -> Chromatogram {
        let channel: Vec<u16> = (0..40).collect();
        Chromatogram::new(
            b"ACGT".to_vec(),
            vec![10, 20, 30, 40],
            Channels::new(channel.clone(), channel.clone(), channel.clone(), channel),
            vec![5, 15, 25, 35],
        )
    }

    #[test]
    fn test_validate_ok() {
        sample_chromatogram().validate().unwrap();
        Chromatogram::default().validate().unwrap();
    }

    #[test]
    fn test_validate_confidence_mismatch() {
        let mut chrom = sample_chromatogram();
        chrom.confidence.pop();
        assert!(matches!(chrom.validate(), Err(ZtrError::Encoding(_))));
    }

    #[test]
    fn test_validate_unequal_channels() {
        let mut chrom = sample_chromatogram();
        chrom.channels.g.push(7);
        assert!(matches!(chrom.validate(), Err(ZtrError::Encoding(_))));
    }

    #[test]
    fn test_validate_decreasing_peaks() {
        let mut chrom = sample_chromatogram();
        chrom.peaks = vec![5, 15, 14, 35];
        assert!(matches!(chrom.validate(), Err(ZtrError::Encoding(_))));
    }

    #[test]
    fn test_validate_peak_past_samples() {
        let mut chrom = sample_chromatogram();
        chrom.peaks[3] = 40;
        assert!(matches!(chrom.validate(), Err(ZtrError::Encoding(_))));
    }

    #[test]
    fn test_peaks_without_samples() {
        let chrom = Chromatogram::new(
            b"AC".to_vec(),
            vec![1, 2],
            Channels::default(),
            vec![100, 200],
        );
        chrom.validate().unwrap();
    }

    #[test]
    fn test_builders() {
        let chrom = Chromatogram::default().with_comment("MACH", "ABI 3730").with_clip(3, 9);
        assert_eq!(chrom.comments.get("MACH").map(String::as_str), Some("ABI 3730"));
        assert_eq!(chrom.clip, Some(ClipRange { left: 3, right: 9 }));
        assert!(chrom.is_empty());
    }
}
