//! Object storage for processed audio.

mod s3;

pub use s3::S3Store;

use crate::config::StorageSettings;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use std::path::Path;
use tracing::warn;

/// Content type of every processed file.
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Trait for object stores that hand back a public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key` and return its public URL.
    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> Result<String>;
}

/// Storage key for a processed file.
///
/// `{prefix}/{YYYYmmdd_HHMMSS}_{8 hex chars}_{stem}_with_bgm.wav`, where `stem`
/// is the original file name without its extension.
pub fn processed_audio_key<Tz>(prefix: &str, original_filename: &str, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let unique = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "{}/{}_{}_{}_with_bgm.wav",
        prefix.trim_end_matches('/'),
        now.format("%Y%m%d_%H%M%S"),
        &unique[..8],
        stem
    )
}

/// Virtual-hosted style public URL of an S3 object.
pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

/// Whether static AWS credentials are present.
pub fn has_aws_credentials<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let set = |name: &str| lookup(name).is_some_and(|v| !v.trim().is_empty());
    set("AWS_ACCESS_KEY_ID") && set("AWS_SECRET_ACCESS_KEY")
}

/// Build the configured store, or `None` when uploads are off.
pub async fn from_settings(settings: &StorageSettings) -> Option<S3Store> {
    if !settings.enabled {
        warn!("S3 upload disabled by configuration");
        return None;
    }

    if !has_aws_credentials(|k| std::env::var(k).ok()) {
        warn!("S3 uploader disabled - AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set");
        return None;
    }

    Some(S3Store::new(settings).await)
}
