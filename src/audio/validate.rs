//! Input validation for audio files.

use super::decode::probe_file;
use crate::error::{Result, UndertoneError};
use std::path::Path;

/// Supported audio file extensions (lowercase, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg", "wma"];

/// Lowercased extension of `name`, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Check if a path or file name has a supported audio extension.
pub fn is_supported_extension(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Human-readable list of supported extensions, e.g. `.mp3, .wav`.
pub fn supported_formats() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn validate_file_extension(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(UndertoneError::InvalidInput("No filename provided".to_string()));
    }

    if !is_supported_extension(name) {
        let ext = extension_of(name).map(|e| format!(".{}", e)).unwrap_or_default();
        return Err(UndertoneError::InvalidInput(format!(
            "Unsupported file type: {}. Supported types: {}",
            ext,
            supported_formats()
        )));
    }

    Ok(())
}

pub fn validate_file_size(path: &Path, max_bytes: u64) -> Result<()> {
    if !path.exists() {
        return Err(UndertoneError::InvalidInput(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(UndertoneError::InvalidInput(format!(
            "File too large: {:.2}MB. Maximum allowed: {}MB",
            size as f64 / (1024.0 * 1024.0),
            max_bytes / (1024 * 1024)
        )));
    }

    if size == 0 {
        return Err(UndertoneError::InvalidInput("Audio file is empty".to_string()));
    }

    Ok(())
}

/// Full check: extension, existence, size limit, non-empty and readable by the decoder.
pub fn validate_audio_file(path: &Path, max_bytes: u64) -> Result<()> {
    validate_file_extension(&path.to_string_lossy())?;
    validate_file_size(path, max_bytes)?;
    probe_file(path)
        .map(|_| ())
        .map_err(|e| UndertoneError::InvalidInput(format!("Invalid audio file: {}", e)))
}
