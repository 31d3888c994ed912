pub mod audio;
pub mod config;
pub mod guide;
pub mod history;
pub mod logging;
pub mod services;
pub mod vision;

pub use audio::{decode_pcm, AudioError, DecodedAudioBuffer, PcmFormat, PlaybackEngine, PlaybackState, PlaybackStatus};
pub use guide::{Guide, GuideError, Landmark, ScanStage};
