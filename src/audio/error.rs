use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    /// Base64 text or byte layout does not describe a valid PCM stream.
    #[error("malformed audio encoding: {0}")]
    MalformedEncoding(String),

    /// The host audio output could not be created or resumed.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),

    /// Stop was requested on an output node that already finished.
    #[error("output node already stopped")]
    AlreadyStopped,

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("wav export failed: {0}")]
    Wav(#[from] hound::Error),
}

impl AudioError {
    pub fn malformed(details: impl Into<String>) -> Self {
        Self::MalformedEncoding(details.into())
    }

    pub fn unavailable(details: impl Into<String>) -> Self {
        Self::OutputUnavailable(details.into())
    }
}
