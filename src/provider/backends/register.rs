use std::path::PathBuf;
use std::sync::Arc;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::AssetProvider;

/// Provider credentials sourced from the CLI or environment.
///
/// These take priority over anything set in the config file.
#[derive(Debug, Default, Clone)]
pub struct Credentials {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderConfigs {
    Cloudinary {
        #[serde(default = "default_api_base")]
        api_base: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        cloud_name: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_secret: Option<String>,
    },
    FileSystem {
        /// The directory assets are written to.
        directory: PathBuf,

        /// The public base URL the directory is served from.
        public_url: String,
    },
}

impl Default for ProviderConfigs {
    fn default() -> Self {
        Self::Cloudinary {
            api_base: default_api_base(),
            cloud_name: None,
            api_key: None,
            api_secret: None,
        }
    }
}

impl ProviderConfigs {
    pub fn with_credentials(&mut self, creds: Credentials) {
        if let Self::Cloudinary { cloud_name, api_key, api_secret, .. } = self {
            *cloud_name = creds.cloud_name.or_else(|| cloud_name.take());
            *api_key = creds.api_key.or_else(|| api_key.take());
            *api_secret = creds.api_secret.or_else(|| api_secret.take());
        }
    }

    pub fn connect(&self) -> anyhow::Result<Arc<dyn AssetProvider>> {
        match self {
            Self::Cloudinary { api_base, cloud_name, api_key, api_secret } => {
                let cloud_name = cloud_name
                    .as_deref()
                    .ok_or_else(|| anyhow!("missing Cloudinary cloud name, set CLOUDINARY_CLOUD_NAME"))?;
                let api_key = api_key
                    .as_deref()
                    .ok_or_else(|| anyhow!("missing Cloudinary api key, set CLOUDINARY_API_KEY"))?;
                let api_secret = api_secret
                    .as_deref()
                    .ok_or_else(|| anyhow!("missing Cloudinary api secret, set CLOUDINARY_API_SECRET"))?;

                let backend = super::cloudinary::CloudinaryBackend::new(
                    api_base,
                    cloud_name,
                    api_key,
                    api_secret,
                )?;
                Ok(Arc::new(backend))
            },
            Self::FileSystem { directory, public_url } => {
                Ok(Arc::new(super::filesystem::FileSystemBackend::new(
                    directory.clone(),
                    public_url.clone(),
                )))
            }
        }
    }
}

fn default_api_base() -> String {
    "https://api.cloudinary.com".to_string()
}
