//! Sample-rate and channel-layout conversion.
//!
//! BGM clips come in whatever format the library was authored in; before they
//! can be overlaid on the voice track they are conformed to its rate and
//! channel count.

use super::AudioBuffer;
use crate::error::{Result, UndertoneError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

const CHUNK_SIZE: usize = 1024;

/// Convert `buffer` to the given sample rate and channel count.
pub fn conform(buffer: AudioBuffer, sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if buffer.sample_rate() == sample_rate && buffer.channels() == channels {
        return Ok(buffer);
    }

    debug!(
        from_rate = buffer.sample_rate(),
        to_rate = sample_rate,
        from_channels = buffer.channels(),
        to_channels = channels,
        "Conforming audio"
    );

    // Downmix before resampling so fewer channels go through the filter.
    if channels < buffer.channels() {
        let mixed = convert_channels(&buffer, channels);
        resample(&mixed, sample_rate)
    } else {
        let resampled = resample(&buffer, sample_rate)?;
        Ok(convert_channels(&resampled, channels))
    }
}

/// Change the channel count.
///
/// Mono is duplicated into every output channel; anything else goes through a
/// mono average first unless the counts already match.
pub fn convert_channels(buffer: &AudioBuffer, channels: u16) -> AudioBuffer {
    let from = buffer.channels() as usize;
    let to = channels.max(1) as usize;

    if from == to {
        return buffer.clone();
    }

    let mono: Vec<f32> = if from == 1 {
        buffer.samples().to_vec()
    } else {
        buffer
            .samples()
            .chunks_exact(from)
            .map(|frame| frame.iter().sum::<f32>() / from as f32)
            .collect()
    };

    let samples = if to == 1 {
        mono
    } else {
        mono.iter()
            .flat_map(|&s| std::iter::repeat(s).take(to))
            .collect()
    };

    AudioBuffer::new(samples, buffer.sample_rate(), to as u16)
}

/// Resample with a windowed-sinc filter, compensating for the filter delay so
/// the output stays aligned with the input.
pub fn resample(buffer: &AudioBuffer, to_rate: u32) -> Result<AudioBuffer> {
    let from_rate = buffer.sample_rate();
    if from_rate == to_rate || buffer.is_empty() {
        return Ok(AudioBuffer::new(
            buffer.samples().to_vec(),
            to_rate,
            buffer.channels(),
        ));
    }

    let channels = buffer.channels() as usize;
    let frames = buffer.frames();

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, channels)
        .map_err(|e| UndertoneError::Resample(format!("resampler init: {}", e)))?;

    // De-interleave
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for frame in buffer.samples().chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).round() as usize;
    let wanted = expected + delay;

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted + CHUNK_SIZE); channels];
    let mut pos = 0;

    // Past the end of the input, keep feeding silence until the delayed tail is flushed.
    while output[0].len() < wanted {
        let input: Vec<Vec<f32>> = planar
            .iter()
            .map(|ch| {
                let start = pos.min(frames);
                let end = (pos + CHUNK_SIZE).min(frames);
                let mut chunk = ch[start..end].to_vec();
                chunk.resize(CHUNK_SIZE, 0.0);
                chunk
            })
            .collect();

        let result = resampler
            .process(&input, None)
            .map_err(|e| UndertoneError::Resample(format!("resample: {}", e)))?;

        for (out, res) in output.iter_mut().zip(result) {
            out.extend_from_slice(&res);
        }
        pos += CHUNK_SIZE;
    }

    let mut samples = Vec::with_capacity(expected * channels);
    for i in delay..delay + expected {
        for ch in &output {
            samples.push(ch[i]);
        }
    }

    Ok(AudioBuffer::new(samples, to_rate, channels as u16))
}
