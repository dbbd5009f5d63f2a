//! Theme-aware BGM mixing.
//!
//! Every themed span gets its own BGM segment: a clip from the span's theme
//! looped or cut to the span length, faded at both ends and reduced in level.
//! The segments are laid onto a silent track as long as the voice, which is
//! then summed with the voice.

use crate::audio::{conform, decode_file, AudioBuffer};
use crate::catalog::{BgmCatalog, SelectionStrategy};
use crate::config::MixingSettings;
use crate::error::Result;
use crate::theme::ThemedSpan;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parameters for a single mix.
#[derive(Debug, Clone, PartialEq)]
pub struct MixOptions {
    /// dB subtracted from every BGM segment.
    pub volume_reduction_db: f32,
    pub max_fade_ms: u64,
    pub fade_divisor: u64,
    pub selection: SelectionStrategy,
}

impl Default for MixOptions {
    fn default() -> Self {
        MixOptions::from(&MixingSettings::default())
    }
}

impl From<&MixingSettings> for MixOptions {
    fn from(settings: &MixingSettings) -> Self {
        Self {
            volume_reduction_db: settings.bgm_volume_reduction_db,
            max_fade_ms: settings.max_fade_ms,
            fade_divisor: settings.fade_divisor,
            selection: settings.selection,
        }
    }
}

impl MixOptions {
    pub fn with_volume_reduction(mut self, db: f32) -> Self {
        self.volume_reduction_db = db;
        self
    }

    /// Fade length for a segment of `len_ms`.
    pub fn fade_ms(&self, len_ms: u64) -> u64 {
        self.max_fade_ms.min(len_ms / self.fade_divisor.max(1))
    }
}

/// Where a BGM segment was placed and which clip filled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub start_ms: u64,
    pub end_ms: u64,
    /// Theme label as returned by the classifier.
    pub theme: String,
    /// `None` when the theme had no clips and the span stayed silent.
    pub clip: Option<PathBuf>,
}

/// Result of [`mix`].
#[derive(Debug, Clone)]
pub struct MixOutput {
    pub audio: AudioBuffer,
    pub placements: Vec<Placement>,
}

/// Decoded clips, conformed to the voice format, keyed by path.
struct ClipCache {
    sample_rate: u32,
    channels: u16,
    clips: HashMap<PathBuf, AudioBuffer>,
}

impl ClipCache {
    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            clips: HashMap::new(),
        }
    }

    fn get(&mut self, path: &Path) -> Result<&AudioBuffer> {
        match self.clips.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("Decoding BGM clip {}", path.display());
                let decoded = conform(decode_file(path)?, self.sample_rate, self.channels)?;
                Ok(entry.insert(decoded))
            }
        }
    }
}

/// Mix themed BGM under `voice`.
///
/// The returned audio has exactly the voice's length, sample rate and
/// channel count.
pub fn mix<R: Rng + ?Sized>(
    voice: &AudioBuffer,
    spans: &[ThemedSpan],
    catalog: &BgmCatalog,
    options: &MixOptions,
    rng: &mut R,
) -> Result<MixOutput> {
    let rate = voice.sample_rate();
    let channels = voice.channels();
    let mut cache = ClipCache::new(rate, channels);
    let mut track = AudioBuffer::silent_like(voice);
    let mut placements = Vec::with_capacity(spans.len());

    for (index, span) in spans.iter().enumerate() {
        let start_ms = span.start_ms();
        let end_ms = span.end_ms();

        if end_ms <= start_ms {
            warn!(
                "Skipping invalid segment duration: {} ms for theme '{}'",
                end_ms as i64 - start_ms as i64,
                span.theme
            );
            continue;
        }
        let len_ms = end_ms - start_ms;

        let clip = span
            .parsed_theme()
            .and_then(|theme| options.selection.pick(catalog.clips(theme), index, rng));

        let Some(clip) = clip else {
            warn!("No BGM found for theme '{}', using silence", span.theme);
            placements.push(Placement {
                start_ms,
                end_ms,
                theme: span.theme.clone(),
                clip: None,
            });
            continue;
        };

        let fade = options.fade_ms(len_ms);
        let segment = cache
            .get(&clip.path)?
            .loop_to_ms(len_ms)
            .fade_in(fade)
            .fade_out(fade)
            .apply_gain_db(-options.volume_reduction_db);

        debug!(
            "Placing {} at {}-{} ms (fade {} ms)",
            clip.file_name(),
            start_ms,
            end_ms,
            fade
        );
        track.overlay(&segment, start_ms)?;

        placements.push(Placement {
            start_ms,
            end_ms,
            theme: span.theme.clone(),
            clip: Some(clip.path.clone()),
        });
    }

    info!(
        "Mixed {} BGM segments (-{} dB)",
        placements.iter().filter(|p| p.clip.is_some()).count(),
        options.volume_reduction_db
    );

    let mut audio = voice.clone();
    audio.overlay(&track, 0)?;

    Ok(MixOutput {
        audio: audio.clamp(),
        placements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;
    use crate::catalog::BgmClip;
    use crate::theme::Theme;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RATE: u32 = 8000;

    fn constant(level: f32, ms: u64) -> AudioBuffer {
        let frames = (ms * RATE as u64 / 1000) as usize;
        AudioBuffer::new(vec![level; frames], RATE, 1)
    }

    fn sample_at(buffer: &AudioBuffer, ms: u64) -> f32 {
        buffer.samples()[(ms * RATE as u64 / 1000) as usize]
    }

    fn catalog_with(dir: &Path, clips: &[(Theme, &str, f32)]) -> BgmCatalog {
        BgmCatalog::from_clips(clips.iter().map(|(theme, name, level)| {
            let path = dir.join(name);
            write_wav(&path, &constant(*level, 300)).unwrap();
            BgmClip::new(*theme, path)
        }))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn test_output_matches_voice_length() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &[(Theme::Hook, "hook.wav", 0.5)]);
        let voice = AudioBuffer::silent(2000, RATE, 1);
        // Second span runs past the end of the voice
        let spans = vec![
            ThemedSpan::new(0.0, 1.0, "Hook"),
            ThemedSpan::new(1.5, 4.0, "Hook"),
        ];

        let out = mix(&voice, &spans, &catalog, &MixOptions::default(), &mut rng()).unwrap();
        assert_eq!(out.audio.frames(), voice.frames());
        assert_eq!(out.audio.duration_ms(), 2000);
        assert_eq!(out.placements.len(), 2);
    }

    #[test]
    fn test_segment_level_and_fades() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &[(Theme::What, "what.wav", 0.5)]);
        let voice = AudioBuffer::silent(1000, RATE, 1);
        let spans = vec![ThemedSpan::new(0.0, 1.0, "What")];
        let options = MixOptions::default().with_volume_reduction(20.0);

        let out = mix(&voice, &spans, &catalog, &options, &mut rng()).unwrap();

        // fade = min(2000, 1000 / 4) = 250 ms
        assert_eq!(sample_at(&out.audio, 0), 0.0);
        assert!((sample_at(&out.audio, 500) - 0.05).abs() < 1e-3);
        assert!(sample_at(&out.audio, 125) < sample_at(&out.audio, 500));
        assert!(out.audio.samples().last().unwrap().abs() < 1e-3);
    }

    #[test]
    fn test_default_reduction_level() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &[(Theme::How, "how.wav", 1.0)]);
        let voice = AudioBuffer::silent(4000, RATE, 1);
        let spans = vec![ThemedSpan::new(0.0, 4.0, "How")];

        let out = mix(&voice, &spans, &catalog, &MixOptions::default(), &mut rng()).unwrap();
        // -35 dB is a factor of about 0.0178
        assert!((sample_at(&out.audio, 2000) - 0.0178).abs() < 5e-4);
    }

    #[test]
    fn test_unknown_theme_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &[(Theme::Hook, "hook.wav", 0.5)]);
        let voice = constant(0.25, 1000);
        let spans = vec![
            ThemedSpan::new(0.0, 0.5, "Outro"),
            ThemedSpan::new(0.5, 1.0, "Why"),
        ];

        let out = mix(&voice, &spans, &catalog, &MixOptions::default(), &mut rng()).unwrap();
        assert_eq!(out.audio.samples(), voice.samples());
        assert!(out.placements.iter().all(|p| p.clip.is_none()));
    }

    #[test]
    fn test_empty_spans_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &[(Theme::Hook, "hook.wav", 0.5)]);
        let voice = AudioBuffer::silent(1000, RATE, 1);
        let spans = vec![
            ThemedSpan::new(0.5, 0.5, "Hook"),
            ThemedSpan::new(0.8, 0.2, "Hook"),
        ];

        let out = mix(&voice, &spans, &catalog, &MixOptions::default(), &mut rng()).unwrap();
        assert!(out.placements.is_empty());
        assert_eq!(out.audio.peak(), 0.0);
    }

    #[test]
    fn test_round_robin_placements() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog_with(
            dir.path(),
            &[(Theme::Why, "a.wav", 0.5), (Theme::Why, "b.wav", 0.5)],
        );
        let voice = AudioBuffer::silent(3000, RATE, 1);
        let spans = vec![
            ThemedSpan::new(0.0, 1.0, "Why"),
            ThemedSpan::new(1.0, 2.0, "Why"),
            ThemedSpan::new(2.0, 3.0, "Why"),
        ];
        let options = MixOptions {
            selection: SelectionStrategy::RoundRobin,
            ..MixOptions::default()
        };

        let out = mix(&voice, &spans, &catalog, &options, &mut rng()).unwrap();
        let names: Vec<String> = out
            .placements
            .iter()
            .map(|p| p.clip.as_ref().unwrap().file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav", "a.wav"]);
    }

    #[test]
    fn test_clip_conformed_to_voice_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let clip = AudioBuffer::new(vec![0.5; 16000], 16000, 2);
        write_wav(&path, &clip).unwrap();
        let catalog = BgmCatalog::from_clips([BgmClip::new(Theme::Hook, &path)]);

        let voice = AudioBuffer::silent(1000, RATE, 1);
        let spans = vec![ThemedSpan::new(0.0, 1.0, "Hook")];

        let out = mix(&voice, &spans, &catalog, &MixOptions::default(), &mut rng()).unwrap();
        assert_eq!(out.audio.channels(), 1);
        assert_eq!(out.audio.sample_rate(), RATE);
        assert_eq!(out.audio.frames(), voice.frames());
        assert!(out.audio.peak() > 0.0);
    }

    #[test]
    fn test_track_covers_voice_tail_at_cd_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hook.wav");
        write_wav(&path, &AudioBuffer::new(vec![0.5; 4410], 44_100, 1)).unwrap();
        let catalog = BgmCatalog::from_clips([BgmClip::new(Theme::Hook, &path)]);

        // 1001 ms is 44_144.1 frames; the BGM must reach past frame 44_100
        let voice = AudioBuffer::new(vec![0.0; 44_144], 44_100, 1);
        let spans = vec![ThemedSpan::new(0.0, 1.001, "Hook")];

        let out = mix(&voice, &spans, &catalog, &MixOptions::default(), &mut rng()).unwrap();
        assert_eq!(out.audio.frames(), 44_144);
        assert_eq!(out.audio.duration_ms(), 1001);
        assert!(out.audio.samples()[44_110] > 0.0);
    }

    #[test]
    fn test_fade_length() {
        let options = MixOptions::default();
        assert_eq!(options.fade_ms(1000), 250);
        assert_eq!(options.fade_ms(60_000), 2000);
        assert_eq!(options.fade_ms(3), 0);
    }
}
