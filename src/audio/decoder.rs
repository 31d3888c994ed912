use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::buffer::DecodedAudioBuffer;
use super::error::AudioError;
use super::format::{PcmFormat, BYTES_PER_SAMPLE};

/// Full-scale divisor for signed 16-bit PCM.
const I16_SCALE: f32 = 32768.0;

/// Decode base64 raw PCM (signed 16-bit little-endian) into normalized floats.
///
/// The layout is taken from `format`, never from the data. Each sample maps to
/// `value / 32768.0`, so the output always lies in `[-1.0, 1.0)`.
pub fn decode_pcm(encoded: &str, format: PcmFormat) -> Result<DecodedAudioBuffer, AudioError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AudioError::malformed(format!("invalid base64: {}", e)))?;

    let samples = pcm_i16_to_f32(&bytes, format)?;
    Ok(DecodedAudioBuffer::new(samples, format))
}

/// Convert already-decoded PCM bytes. Exposed for callers that receive raw
/// bytes instead of base64 text.
pub fn pcm_i16_to_f32(bytes: &[u8], format: PcmFormat) -> Result<Vec<f32>, AudioError> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(AudioError::malformed(format!(
            "odd byte length {} for 16-bit samples",
            bytes.len()
        )));
    }
    if bytes.len() % format.bytes_per_frame() != 0 {
        return Err(AudioError::malformed(format!(
            "byte length {} is not a whole number of {}-channel frames",
            bytes.len(),
            format.channels
        )));
    }

    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE)
        .collect())
}
