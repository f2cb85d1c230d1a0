use async_trait::async_trait;
use bytes::Bytes;

use crate::config::Transformation;

/// A single asset to hand over to the provider.
#[derive(Debug, Clone)]
pub struct AssetUpload {
    /// The identifier to store the asset under, relative to `folder`.
    pub public_id: String,

    /// The folder to place the asset in.
    pub folder: String,

    /// The formats the provider should accept for this asset.
    pub allowed_formats: Vec<String>,

    /// The transformation the provider should apply before storing.
    pub transformation: Transformation,

    /// The file name given by the client, if any.
    pub file_name: Option<String>,

    /// The declared content type of the file.
    pub content_type: String,

    pub data: Bytes,
}

/// The provider's view of a stored asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub public_id: String,
}

#[async_trait]
pub trait AssetProvider: Sync + Send + 'static {
    async fn upload(&self, asset: AssetUpload) -> anyhow::Result<StoredAsset>;

    /// Removes a stored asset.
    ///
    /// Removing an asset that does not exist is not an error.
    async fn destroy(&self, public_id: &str) -> anyhow::Result<()>;
}
