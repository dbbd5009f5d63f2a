//! Amazon S3 object store.

use super::{public_url, ObjectStore};
use crate::config::StorageSettings;
use crate::error::{Result, UndertoneError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{info, instrument};

/// Uploads to a single bucket using the default AWS credential chain.
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Store {
    pub async fn new(settings: &StorageSettings) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        Self {
            client: Client::new(&config),
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self, path), fields(bucket = %self.bucket))]
    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> Result<String> {
        info!("Uploading {} to S3 as {}", path.display(), key);

        let body = ByteStream::from_path(path).await.map_err(|e| {
            UndertoneError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                UndertoneError::Storage(format!(
                    "Failed to upload file to S3: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let url = public_url(&self.bucket, &self.region, key);
        info!("File uploaded successfully: {}", url);
        Ok(url)
    }
}
