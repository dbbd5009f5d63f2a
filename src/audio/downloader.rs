//! Fetching remote audio over HTTP.
//!
//! The API accepts a URL (typically a public S3 object) instead of an upload.
//! The body is streamed into a temporary file that keeps the URL's extension
//! so the decoder can use it as a format hint.

use super::validate::{extension_of, supported_formats, SUPPORTED_EXTENSIONS};
use crate::error::{Result, UndertoneError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};
use url::Url;

/// File name and lowercased extension taken from the last path segment of a
/// remote audio URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAudio {
    pub url: Url,
    pub file_name: String,
    pub extension: String,
}

impl RemoteAudio {
    /// Validate an `http(s)` URL pointing at a supported audio file.
    pub fn parse(raw: &str) -> Result<Self> {
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return Err(UndertoneError::InvalidInput(
                "Invalid URL. Please provide a valid HTTP/HTTPS URL.".to_string(),
            ));
        }

        let url = Url::parse(raw)
            .map_err(|e| UndertoneError::InvalidInput(format!("Invalid URL: {}", e)))?;

        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();

        let extension = extension_of(&file_name)
            .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                UndertoneError::InvalidInput(format!(
                    "Unsupported file type. Allowed types: {}",
                    supported_formats()
                ))
            })?;

        Ok(Self {
            url,
            file_name,
            extension,
        })
    }

    /// `processed_<name>.wav` for the original file name.
    pub fn processed_file_name(&self) -> String {
        let renamed = Path::new(&self.file_name).with_extension("wav");
        format!("processed_{}", renamed.to_string_lossy())
    }
}

/// Download `remote` into a new temporary file under `temp_dir`.
///
/// The file is deleted when the returned handle is dropped. Bodies larger than
/// `max_bytes` are rejected while streaming.
#[instrument(skip(client, remote, temp_dir), fields(url = %remote.url))]
pub async fn download_audio(
    client: &reqwest::Client,
    remote: &RemoteAudio,
    temp_dir: &Path,
    max_bytes: u64,
) -> Result<NamedTempFile> {
    std::fs::create_dir_all(temp_dir)?;

    info!("Downloading audio file from {}", remote.url);

    let mut response = client
        .get(remote.url.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| UndertoneError::Download(e.to_string()))?;

    let mut file = tempfile::Builder::new()
        .prefix("undertone-input-")
        .suffix(&format!(".{}", remote.extension))
        .tempfile_in(temp_dir)?;

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| UndertoneError::Download(e.to_string()))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(UndertoneError::Download(format!(
                "File exceeds the maximum size of {}MB",
                max_bytes / (1024 * 1024)
            )));
        }
        file.write_all(&chunk)?;
    }
    file.flush()?;

    debug!("Downloaded {} bytes to {}", written, file.path().display());
    Ok(file)
}
