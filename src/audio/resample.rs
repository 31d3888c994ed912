use rubato::{FftFixedIn, Resampler};

use super::error::AudioError;

const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Convert a mono signal from `from` Hz to `to` Hz.
///
/// Used only when the output device refuses to run at the narration rate.
pub fn resample_mono(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    if from == to || input.is_empty() {
        return Ok(input.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_FRAMES, SUB_CHUNKS, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (input.len() as u64 * to as u64 / from as u64) as usize;
    let mut output = Vec::with_capacity(expected + CHUNK_FRAMES * 2);
    let mut pos = 0;

    while input.len() - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let frames: [&[f32]; 1] = [&input[pos..pos + needed]];
        let chunk = resampler
            .process(&frames, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&chunk[0]);
        pos += needed;
    }

    if pos < input.len() {
        let frames: [&[f32]; 1] = [&input[pos..]];
        let chunk = resampler
            .process_partial(Some(&frames[..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&chunk[0]);
    }

    // Flush whatever the filter is still holding.
    let tail = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    output.extend_from_slice(&tail[0]);

    let delay = resampler.output_delay();
    Ok(output.into_iter().skip(delay).take(expected).collect())
}

/// Average interleaved frames down to a single channel.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
