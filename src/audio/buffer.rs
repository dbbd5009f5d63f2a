//! In-memory PCM buffer and the time-domain operations the mixer is built on.

use crate::error::{Result, UndertoneError};

/// Decoded audio held entirely in memory.
///
/// Samples are f32 in `[-1.0, 1.0]`, interleaved by channel
/// (`[L, R, L, R, ...]` for stereo). All positions and lengths in the public
/// API are milliseconds at the buffer's own sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Wrap interleaved samples. Trailing samples that do not fill a whole frame are dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// A buffer of digital silence.
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = ms_to_frames(duration_ms, sample_rate);
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    /// Silence with exactly the same frame count and format as `other`.
    pub fn silent_like(other: &AudioBuffer) -> Self {
        Self {
            samples: vec![0.0; other.samples.len()],
            sample_rate: other.sample_rate,
            channels: other.channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration rounded to the nearest millisecond.
    ///
    /// Rounding makes `silent(ms, ..)` and `loop_to_ms(ms)` report exactly
    /// `ms` at rates where a millisecond is not a whole number of frames.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        let rate = self.sample_rate as u64;
        (self.frames() as u64 * 1000 + rate / 2) / rate
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Copy of the range `[start_ms, end_ms)`, clamped to the buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> AudioBuffer {
        let frames = self.frames();
        let start = ms_to_frames(start_ms, self.sample_rate).min(frames);
        let end = ms_to_frames(end_ms, self.sample_rate).clamp(start, frames);
        self.slice_frames(start, end)
    }

    fn slice_frames(&self, start: usize, end: usize) -> AudioBuffer {
        let ch = self.channels as usize;
        AudioBuffer {
            samples: self.samples[start * ch..end * ch].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// The buffer concatenated with itself `times` times.
    pub fn repeat(&self, times: usize) -> AudioBuffer {
        AudioBuffer {
            samples: self.samples.repeat(times),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Exactly `len_ms` of audio: looped when shorter, truncated when longer.
    ///
    /// An empty buffer yields silence of the requested length.
    pub fn loop_to_ms(&self, len_ms: u64) -> AudioBuffer {
        let target = ms_to_frames(len_ms, self.sample_rate);
        let frames = self.frames();

        if frames == 0 {
            return AudioBuffer::silent(len_ms, self.sample_rate, self.channels);
        }

        let source = if frames < target {
            self.repeat(target / frames + 1)
        } else {
            self.clone()
        };

        source.slice_frames(0, target)
    }

    /// Linear amplitude ramp from silence to unity over the first `fade_ms`.
    pub fn fade_in(mut self, fade_ms: u64) -> AudioBuffer {
        let n = ms_to_frames(fade_ms, self.sample_rate).min(self.frames());
        let ch = self.channels as usize;
        for i in 0..n {
            let gain = i as f32 / n as f32;
            for s in &mut self.samples[i * ch..(i + 1) * ch] {
                *s *= gain;
            }
        }
        self
    }

    /// Linear amplitude ramp from unity to silence over the last `fade_ms`.
    pub fn fade_out(mut self, fade_ms: u64) -> AudioBuffer {
        let frames = self.frames();
        let n = ms_to_frames(fade_ms, self.sample_rate).min(frames);
        let ch = self.channels as usize;
        let first = frames - n;
        for j in 0..n {
            let gain = 1.0 - (j + 1) as f32 / n as f32;
            let frame = first + j;
            for s in &mut self.samples[frame * ch..(frame + 1) * ch] {
                *s *= gain;
            }
        }
        self
    }

    /// Scale by `db` decibels (negative values attenuate).
    pub fn apply_gain_db(mut self, db: f32) -> AudioBuffer {
        let factor = db_to_linear(db);
        for s in &mut self.samples {
            *s *= factor;
        }
        self
    }

    /// Add `other` into this buffer starting at `position_ms`.
    ///
    /// The length of `self` never changes; whatever of `other` runs past the
    /// end is dropped. Both buffers must share sample rate and channel count.
    pub fn overlay(&mut self, other: &AudioBuffer, position_ms: u64) -> Result<()> {
        if other.sample_rate != self.sample_rate || other.channels != self.channels {
            return Err(UndertoneError::InvalidInput(format!(
                "Cannot overlay {} Hz/{} ch onto {} Hz/{} ch",
                other.sample_rate, other.channels, self.sample_rate, self.channels
            )));
        }

        let ch = self.channels as usize;
        let start = ms_to_frames(position_ms, self.sample_rate) * ch;
        if start >= self.samples.len() {
            return Ok(());
        }

        for (dst, src) in self.samples[start..].iter_mut().zip(&other.samples) {
            *dst += *src;
        }
        Ok(())
    }

    /// Hard-clip every sample to `[-1.0, 1.0]`.
    pub fn clamp(mut self) -> AudioBuffer {
        for s in &mut self.samples {
            *s = s.clamp(-1.0, 1.0);
        }
        self
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

/// Convert a millisecond position to a frame index at `sample_rate`.
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Convert decibels to a linear amplitude factor.
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
