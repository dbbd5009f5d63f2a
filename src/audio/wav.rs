//! WAV encoding via hound.

use super::AudioBuffer;
use crate::error::{Result, UndertoneError};
use std::path::Path;
use tracing::debug;

/// Write `buffer` as 16-bit PCM WAV, clipping out-of-range samples.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| {
        UndertoneError::Encode(format!("Failed to create {}: {}", path.display(), e))
    })?;

    for &sample in buffer.samples() {
        writer
            .write_sample(to_i16(sample))
            .map_err(|e| UndertoneError::Encode(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| UndertoneError::Encode(format!("Failed to finalize WAV: {}", e)))?;

    debug!(path = %path.display(), duration_ms = buffer.duration_ms(), "WAV written");
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
