//! Narration audio: PCM decoding and device playback.
//! The decoder is pure; the player owns the output device.

pub mod buffer;
pub mod cpal_backend;
pub mod decoder;
pub mod error;
pub mod format;
pub mod mock;
pub mod output;
pub mod player;
pub mod resample;
pub mod wav;

pub use buffer::DecodedAudioBuffer;
pub use cpal_backend::CpalBackend;
pub use decoder::decode_pcm;
pub use error::AudioError;
pub use format::PcmFormat;
pub use mock::MockBackend;
pub use output::{AudioBackend, ContextState, OutputContext, OutputNode};
pub use player::{PlaybackEngine, PlaybackState, PlaybackStatus, PlayerConfig};

/// Playback engine bound to the default output device.
pub type DevicePlayer = PlaybackEngine<CpalBackend>;
