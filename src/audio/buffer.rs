use std::sync::Arc;

use super::format::PcmFormat;

/// Decoded, normalized samples ready for output.
///
/// Samples are interleaved when `channels > 1`. The sample storage is shared,
/// so cloning a buffer never copies audio data.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    samples: Arc<[f32]>,
    format: PcmFormat,
}

impl DecodedAudioBuffer {
    pub fn new(samples: Vec<f32>, format: PcmFormat) -> Self {
        Self {
            samples: samples.into(),
            format,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Number of frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.format.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
