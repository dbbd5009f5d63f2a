//! Undertone - theme-aware background music for spoken audio
//!
//! Takes a voice recording (a talk, lecture or podcast episode), finds its
//! narrative structure and lays background music from a themed library
//! underneath each section.
//!
//! # Overview
//!
//! 1. Transcribe the recording with segment timestamps (Whisper).
//! 2. Group the segments into themed spans (Hook, What, Why, How, Ending
//!    Hook) with a chat model.
//! 3. For every span, pick a clip from that theme's folder, loop or cut it to
//!    the span length, fade both ends and reduce its level.
//! 4. Sum the BGM track with the voice and write a 16-bit WAV.
//!
//! # Architecture
//!
//! - `config` - Settings file, environment overrides and prompt templates
//! - `audio` - Decoding, resampling, buffer operations, download and WAV output
//! - `transcription` - Speech-to-text with segment timestamps
//! - `theme` - Themes, themed spans and transcript classification
//! - `catalog` - The themed BGM library on disk and clip selection
//! - `mixer` - BGM placement and mixing
//! - `pipeline` - End-to-end processing of one file
//! - `storage` - Upload of processed files to S3
//! - `cli` - Command-line interface and HTTP API
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use undertone::config::Settings;
//! use undertone::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(&settings)?;
//!
//!     let result = pipeline
//!         .process(Path::new("talk.mp3"), Some(Path::new("talk_with_bgm.wav")), 35.0)
//!         .await?;
//!     println!("Placed {} BGM segments", result.placements.len());
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod mixer;
pub mod openai;
pub mod pipeline;
pub mod storage;
pub mod theme;
pub mod transcription;

pub use error::{Result, UndertoneError};
