//! Transcription module for Undertone.
//!
//! Speech-to-text with segment-level timestamps. The pipeline only needs
//! `(start, end, text)` triples, so the trait is deliberately narrow.

mod models;
mod whisper;

pub use models::{Transcript, TranscriptSegment};
pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file and return segments with timestamps.
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}
