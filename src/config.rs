use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::provider::backends::ProviderConfigs;
use crate::storage::backends::StoreConfigs;

/// The default upload limit of 5MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// The address to bind the HTTP server to.
    pub host: String,

    /// The port to bind the HTTP server to.
    ///
    /// Defaults to `3000`.
    pub port: u16,

    /// The document store that upload records are persisted in.
    pub store: StoreConfigs,

    /// The remote provider images are uploaded to.
    pub provider: ProviderConfigs,

    /// The upload policy applied to every incoming file.
    pub upload: UploadConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            store: StoreConfigs::default(),
            provider: ProviderConfigs::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Loads the config from a YAML file.
    ///
    /// Any fields missing from the file fall back to their defaults.
    pub async fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// The folder assets are placed in with the provider.
    pub folder: String,

    /// The formats the provider is allowed to accept.
    ///
    /// Defaults to `jpeg`, `png` and `jpg`.
    pub allowed_formats: Vec<String>,

    /// The transformation the provider applies to every upload.
    pub transformation: Transformation,

    /// The maximum accepted file size in bytes.
    ///
    /// Defaults to 5MiB.
    pub max_upload_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            folder: "images-folder".to_string(),
            allowed_formats: vec!["jpeg".to_string(), "png".to_string(), "jpg".to_string()],
            transformation: Transformation::default(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    /// The width to transform the image to.
    pub width: u32,

    /// The height to transform the image to.
    pub height: u32,

    #[serde(default)]
    /// How the image is fitted into the target dimensions.
    pub crop: CropMode,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            crop: CropMode::Fill,
        }
    }
}

impl Transformation {
    /// Renders the transformation in the provider's URL syntax,
    /// e.g. `c_fill,h_100,w_100`.
    pub fn as_provider_string(&self) -> String {
        format!("c_{},h_{},w_{}", self.crop.as_ref(), self.height, self.width)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CropMode {
    /// Resize and crop so the image exactly covers the target dimensions.
    Fill,

    /// Resize to fit inside the target dimensions keeping the aspect ratio.
    Fit,

    /// Resize to exactly the target dimensions ignoring the aspect ratio.
    Scale,
}

impl Default for CropMode {
    fn default() -> Self {
        Self::Fill
    }
}
