use std::path::Path;

use tracing::info;

use super::buffer::DecodedAudioBuffer;
use super::error::AudioError;

/// Write `buffer` as a 16-bit PCM wav file.
pub fn write_wav(buffer: &DecodedAudioBuffer, path: &Path) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in buffer.samples() {
        let value = (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32);
        writer.write_sample(value as i16)?;
    }
    writer.finalize()?;

    info!(
        path = %path.display(),
        frames = buffer.frame_count(),
        "Narration exported"
    );
    Ok(())
}
