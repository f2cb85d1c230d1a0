use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::provider::{AssetUpload, StoredAsset};
use crate::AssetProvider;

/// Parameters that are sent with a request but never signed.
const UNSIGNED_PARAMS: &[&str] = &["file", "api_key", "resource_type", "cloud_name"];

pub struct CloudinaryBackend {
    client: Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct UploadResult {
    public_id: String,
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct DestroyResult {
    result: String,
}

#[derive(Deserialize)]
struct ErrorResult {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryBackend {
    pub fn new(
        api_base: &str,
        cloud_name: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("imgdrop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    #[inline]
    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1_1/{}/image/{}", self.api_base, self.cloud_name, action)
    }

    /// Builds a form holding the given parameters along with the
    /// api key and request signature.
    fn signed_form(&self, params: Vec<(&'static str, String)>) -> Form {
        let signature = sign_params(&params, &self.api_secret);

        params
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
    }
}

#[async_trait]
impl AssetProvider for CloudinaryBackend {
    async fn upload(&self, asset: AssetUpload) -> Result<StoredAsset> {
        let params = vec![
            ("allowed_formats", asset.allowed_formats.join(",")),
            ("folder", asset.folder),
            ("public_id", asset.public_id),
            ("timestamp", Utc::now().timestamp().to_string()),
            ("transformation", asset.transformation.as_provider_string()),
        ];

        let mut part = Part::bytes(asset.data.to_vec());
        if let Some(name) = asset.file_name {
            part = part.file_name(name);
        }
        let part = part.mime_str(&asset.content_type)?;

        let form = self.signed_form(params).part("file", part);

        let url = self.endpoint("upload");
        debug!("Uploading asset to {}", &url);
        let resp = self.client
            .post(&url)
            .multipart(form)
            .send()
            .await?;

        let result: UploadResult = check_status(resp).await?.json().await?;
        let url = result.secure_url
            .or(result.url)
            .ok_or_else(|| anyhow!("Cloudinary response did not contain an asset url"))?;

        Ok(StoredAsset {
            url,
            public_id: result.public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<()> {
        let params = vec![
            ("public_id", public_id.to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];

        let url = self.endpoint("destroy");
        debug!("Destroying asset {} via {}", public_id, &url);
        let resp = self.client
            .post(&url)
            .multipart(self.signed_form(params))
            .send()
            .await?;

        let result: DestroyResult = check_status(resp).await?.json().await?;
        match result.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(anyhow!("Cloudinary failed to destroy asset {}: {}", public_id, other)),
        }
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let detail = resp
        .json::<ErrorResult>()
        .await
        .map(|e| e.error.message)
        .unwrap_or_else(|_| "no error detail given".to_string());

    Err(anyhow!(
        "Cloudinary did not respond correctly, expected status 200 got {}: {}",
        status,
        detail,
    ))
}

/// Signs a set of request parameters.
///
/// Signed parameters are sorted by name, joined as `key=value` pairs
/// with `&` and suffixed with the api secret before being hashed
/// with SHA-1.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut signed: Vec<_> = params
        .iter()
        .filter(|(key, value)| {
            !value.is_empty() && !UNSIGNED_PARAMS.iter().any(|unsigned| unsigned == key)
        })
        .collect();
    signed.sort_by(|a, b| a.0.cmp(b.0));

    let payload = signed
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
