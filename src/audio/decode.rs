//! Audio decoding via symphonia.
//!
//! Decodes any container/codec symphonia supports (MP3, WAV, FLAC, AAC/M4A,
//! OGG/Vorbis) into an interleaved f32 [`AudioBuffer`], keeping the source
//! sample rate and channel layout.

use super::AudioBuffer;
use crate::error::{Result, UndertoneError};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

/// Stream properties reported by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

fn open_format(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path).map_err(|e| {
        UndertoneError::Decode(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| {
            UndertoneError::Decode(format!("Failed to probe {}: {}", path.display(), e))
        })?;

    Ok(probed.format)
}

/// Read stream properties without decoding any audio.
pub fn probe_file(path: &Path) -> Result<AudioInfo> {
    let format = open_format(path)?;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| UndertoneError::Decode(format!("No audio track in {}", path.display())))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| UndertoneError::Decode("Unknown sample rate".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    Ok(AudioInfo {
        sample_rate,
        channels,
    })
}

/// Decode an entire audio file into memory.
#[instrument(fields(path = %path.display()))]
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    let mut format = open_format(path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| UndertoneError::Decode(format!("No audio track in {}", path.display())))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| UndertoneError::Decode(format!("Unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(UndertoneError::Decode(format!("Error reading packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(UndertoneError::Decode(format!("decode: {}", e))),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }

        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(UndertoneError::Decode(format!(
            "No audio samples decoded from {}",
            path.display()
        )));
    }

    let buffer = AudioBuffer::new(samples, sample_rate, channels);

    debug!(
        sample_rate,
        channels,
        duration_ms = buffer.duration_ms(),
        "Audio decoded"
    );

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/file.mp3")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[test]
    fn test_decode_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(decode_file(&path).is_err());
        assert!(probe_file(&path).is_err());
    }

    #[test]
    fn test_wav_roundtrip_preserves_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<f32> = (0..16_000)
            .map(|i| ((i as f32) * 0.01).sin() * 0.5)
            .collect();
        let original = AudioBuffer::new(samples, 16_000, 2);
        write_wav(&path, &original).unwrap();

        let info = probe_file(&path).unwrap();
        assert_eq!(info, AudioInfo { sample_rate: 16_000, channels: 2 });

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.sample_rate(), 16_000);
        assert_eq!(decoded.channels(), 2);
        assert_eq!(decoded.frames(), original.frames());
        for (a, b) in decoded.samples().iter().zip(original.samples()).take(200) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
