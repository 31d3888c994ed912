use serde::{Deserialize, Serialize};

/// Layout of the raw PCM stream handed over by the narration service.
///
/// The stream carries no header, so these values are an agreement with the
/// producer rather than something read from the bytes. Retarget them through
/// configuration when the upstream format changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

pub const DEFAULT_CHANNELS: u16 = 1;
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Bytes per signed 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl PcmFormat {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    pub fn bytes_per_frame(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels.max(1) as usize
    }
}
