//! End-to-end processing pipeline.
//!
//! Decode the voice recording, transcribe it, classify the transcript into
//! themed spans, mix themed BGM underneath and write the result as WAV.

use crate::audio::{decode_file, extension_of, validate_audio_file, write_wav, AudioBuffer};
use crate::catalog::BgmCatalog;
use crate::config::Settings;
use crate::error::Result;
use crate::mixer::{mix, MixOptions, Placement};
use crate::theme::{Classifier, LlmClassifier, ThemedSpan};
use crate::transcription::{Transcriber, WhisperTranscriber};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// File name prefix of outputs created in the temp directory.
const OUTPUT_PREFIX: &str = "undertone-output-";

/// Outcome of processing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub output_path: PathBuf,
    /// Duration of the voice (and of the output) in milliseconds.
    pub duration_ms: u64,
    /// Spans as returned by the classifier.
    pub spans: Vec<ThemedSpan>,
    /// Segments actually placed (or left silent).
    pub placements: Vec<Placement>,
}

/// The BGM insertion pipeline.
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn Classifier>,
    catalog: Arc<BgmCatalog>,
    options: MixOptions,
    temp_dir: PathBuf,
    max_file_size: u64,
}

impl Pipeline {
    /// Create a pipeline with the OpenAI-backed transcriber and classifier and
    /// the catalog loaded from disk.
    pub fn new(settings: &Settings) -> Result<Self> {
        let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::with_config(
            &settings.openai.transcription_model,
            settings.openai.timeout_secs,
        )?);

        let prompts = settings.prompts.resolve()?;
        let classifier: Arc<dyn Classifier> =
            Arc::new(LlmClassifier::with_config(&settings.openai, prompts)?);

        let catalog = BgmCatalog::load(&settings.catalog_root(), &settings.catalog.folders)?;
        info!("BGM catalog loaded with {} clips", catalog.len());

        Self::with_components(settings, transcriber, classifier, Arc::new(catalog))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: &Settings,
        transcriber: Arc<dyn Transcriber>,
        classifier: Arc<dyn Classifier>,
        catalog: Arc<BgmCatalog>,
    ) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Self {
            transcriber,
            classifier,
            catalog,
            options: MixOptions::from(&settings.mixing),
            temp_dir,
            max_file_size: settings.max_file_size_bytes(),
        })
    }

    pub fn catalog(&self) -> &BgmCatalog {
        &self.catalog
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Process `input` and write the mixed audio.
    ///
    /// Without an explicit `output` the result goes to a new temporary `.wav`
    /// file in the temp directory, which the caller owns afterwards.
    #[instrument(skip(self, output), fields(input = %input.display()))]
    pub async fn process(
        &self,
        input: &Path,
        output: Option<&Path>,
        volume_reduction_db: f32,
    ) -> Result<ProcessResult> {
        validate_audio_file(input, self.max_file_size)?;

        let voice = {
            let path = input.to_path_buf();
            tokio::task::spawn_blocking(move || decode_file(&path)).await??
        };
        info!(
            "Total audio duration: {:.2} seconds ({} Hz, {} ch)",
            voice.duration_seconds(),
            voice.sample_rate(),
            voice.channels()
        );

        // Keep the temp file alive until transcription is done
        let transcription_input = self.transcription_input(input, &voice)?;
        let transcription_path = transcription_input
            .as_ref()
            .map(|f| f.path())
            .unwrap_or(input);

        let transcript = self.transcriber.transcribe(transcription_path).await?;
        drop(transcription_input);
        info!("Transcription completed with {} segments", transcript.segments.len());

        let spans = self.classifier.classify(&transcript).await?;
        info!("Detected {} themed groups", spans.len());
        for span in &spans {
            info!("  {} : {:.2}s - {:.2}s", span.theme, span.start, span.end);
        }

        let output_path = match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                path.to_path_buf()
            }
            None => self.temp_output()?,
        };

        let duration_ms = voice.duration_ms();
        let catalog = Arc::clone(&self.catalog);
        let options = self.options.clone().with_volume_reduction(volume_reduction_db);
        let mix_spans = spans.clone();
        let write_path = output_path.clone();

        let mixed = tokio::task::spawn_blocking(move || -> Result<Vec<Placement>> {
            let mixed = mix(&voice, &mix_spans, &catalog, &options, &mut rand::thread_rng())?;
            write_complete(&write_path, &mixed.audio)?;
            Ok(mixed.placements)
        })
        .await?;

        let placements = match mixed {
            Ok(placements) => placements,
            Err(e) => {
                if output.is_none() {
                    let _ = std::fs::remove_file(&output_path);
                }
                return Err(e);
            }
        };

        info!("Exported processed audio to {}", output_path.display());

        Ok(ProcessResult {
            output_path,
            duration_ms,
            spans,
            placements,
        })
    }

    /// WAV copy of the voice for transcription, unless the input already is WAV.
    fn transcription_input(
        &self,
        input: &Path,
        voice: &AudioBuffer,
    ) -> Result<Option<NamedTempFile>> {
        let is_wav = extension_of(&input.to_string_lossy()).as_deref() == Some("wav");
        if is_wav {
            return Ok(None);
        }

        let file = tempfile::Builder::new()
            .prefix("undertone-voice-")
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)?;
        write_wav(file.path(), voice)?;
        debug!("Re-encoded voice to {} for transcription", file.path().display());
        Ok(Some(file))
    }

    fn temp_output(&self) -> Result<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix(OUTPUT_PREFIX)
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Delete outputs in the temp directory last modified more than `max_age` ago.
    ///
    /// Returns the number of files removed.
    pub fn prune_outputs(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.temp_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(OUTPUT_PREFIX) || !name.ends_with(".wav") {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Removed stale output {}", name);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove stale output {}: {}", name, e),
            }
        }

        if removed > 0 {
            info!("Pruned {} stale output file(s)", removed);
        }
        Ok(removed)
    }
}

/// Write `audio` to a staging file beside `path`, then rename it into place.
///
/// `path` only ever holds a complete file; the staging file is removed when
/// the write fails.
fn write_complete(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let staged = staging_path(path);
    if let Err(e) = write_wav(&staged, audio) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }
    std::fs::rename(&staged, path)?;
    Ok(())
}

/// `<dir>/.<name>.part`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output.wav".to_string());
    path.with_file_name(format!(".{}.part", name))
}
