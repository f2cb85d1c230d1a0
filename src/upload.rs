use std::sync::Arc;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::UploadConfig;
use crate::provider::{AssetUpload, StoredAsset};
use crate::AssetProvider;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Not an image! Please upload an image")]
    NotAnImage,

    #[error("file of {size} bytes exceeds the upload limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("provider failed to store the upload: {0:#}")]
    Provider(anyhow::Error),

    #[error("failed to persist the image record: {0:#}")]
    Store(anyhow::Error),
}

/// A file taken from a multipart request.
#[derive(Debug)]
pub struct IncomingFile {
    /// The name of the form field the file was sent under.
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Applies the upload policy to incoming files and hands
/// accepted files to the provider.
pub struct UploadAdapter {
    provider: Arc<dyn AssetProvider>,
    config: UploadConfig,
}

impl UploadAdapter {
    pub fn new(provider: Arc<dyn AssetProvider>, config: UploadConfig) -> Self {
        Self { provider, config }
    }

    #[inline]
    pub fn cfg(&self) -> &UploadConfig {
        &self.config
    }

    /// Checks the file against the upload policy without
    /// contacting the provider.
    pub fn check(&self, file: &IncomingFile) -> Result<(), UploadError> {
        let is_image = file
            .content_type
            .as_deref()
            .map_or(false, |ct| ct.starts_with("image/"));
        if !is_image {
            return Err(UploadError::NotAnImage);
        }

        self.check_size(file.data.len())
    }

    /// Checks a file size against the upload limit.
    ///
    /// Callers can run this before reading the file into memory.
    pub fn check_size(&self, size: usize) -> Result<(), UploadError> {
        let limit = self.config.max_upload_size;
        if size > limit {
            return Err(UploadError::TooLarge { size, limit });
        }

        Ok(())
    }

    /// Validates the file and uploads it to the provider.
    pub async fn store(&self, file: IncomingFile) -> Result<StoredAsset, UploadError> {
        self.check(&file)?;

        let public_id = storage_key(&file.field_name, Utc::now());
        let asset = AssetUpload {
            public_id,
            folder: self.config.folder.clone(),
            allowed_formats: self.config.allowed_formats.clone(),
            transformation: self.config.transformation,
            file_name: file.file_name,
            content_type: file.content_type.unwrap_or_default(),
            data: file.data,
        };

        debug!(
            "Uploading {} ({} bytes) to provider folder {:?}",
            &asset.public_id,
            asset.data.len(),
            &asset.folder,
        );
        self.provider
            .upload(asset)
            .await
            .map_err(UploadError::Provider)
    }

    /// Removes a previously stored asset from the provider.
    pub async fn discard(&self, public_id: &str) -> anyhow::Result<()> {
        self.provider.destroy(public_id).await
    }
}

/// Names an upload after its form field and the upload time in
/// milliseconds, e.g. `file_1700000000000`.
pub fn storage_key(field_name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", field_name, at.timestamp_millis())
}
