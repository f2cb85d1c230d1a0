use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use anyhow::anyhow;
use async_trait::async_trait;
use image::ImageFormat;
use poem::http::StatusCode;
use poem::test::{TestClient, TestResponse};
use poem::Endpoint;
use serde_json::Value;
use tempfile::TempDir;

use crate::config::UploadConfig;
use crate::context::ImageRecord;
use crate::controller::ImageController;
use crate::provider::backends::filesystem::FileSystemBackend;
use crate::provider::{AssetUpload, StoredAsset};
use crate::storage::backends::memory::MemoryBackend;
use crate::upload::UploadAdapter;
use crate::utils::encode_test_image;
use crate::{routes, AssetProvider, RecordStore};

const BOUNDARY: &str = "imgdrop-test-boundary";
const PUBLIC_URL: &str = "http://localhost:3000/assets";

/// Counts provider calls and hands out predictable urls.
#[derive(Default)]
struct CountingProvider {
    uploads: AtomicUsize,
    destroyed: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl AssetProvider for CountingProvider {
    async fn upload(&self, asset: AssetUpload) -> anyhow::Result<StoredAsset> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(StoredAsset {
            url: format!("{}/{}/{}.png", PUBLIC_URL, asset.folder, asset.public_id),
            public_id: asset.public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> anyhow::Result<()> {
        self.destroyed.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

struct FailingProvider;

#[async_trait]
impl AssetProvider for FailingProvider {
    async fn upload(&self, _asset: AssetUpload) -> anyhow::Result<StoredAsset> {
        Err(anyhow!("provider unreachable"))
    }

    async fn destroy(&self, _public_id: &str) -> anyhow::Result<()> {
        Err(anyhow!("provider unreachable"))
    }
}

struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert(&self, _record: ImageRecord) -> anyhow::Result<ImageRecord> {
        Err(anyhow!("database unreachable"))
    }

    async fn list(&self) -> anyhow::Result<Vec<ImageRecord>> {
        Err(anyhow!("database unreachable"))
    }
}

fn setup_environment(
    provider: Arc<dyn AssetProvider>,
    store: Arc<dyn RecordStore>,
) -> TestClient<impl Endpoint> {
    let adapter = UploadAdapter::new(provider, UploadConfig::default());
    let controller = Arc::new(ImageController::new(adapter, store));
    TestClient::new(routes::build_app(controller, "http://localhost:3000"))
}

fn filesystem_environment() -> anyhow::Result<(TempDir, TestClient<impl Endpoint>)> {
    let dir = tempfile::tempdir()?;
    let provider = FileSystemBackend::new(dir.path().to_path_buf(), PUBLIC_URL.to_string());
    let app = setup_environment(Arc::new(provider), Arc::new(MemoryBackend::default()));
    Ok((dir, app))
}

fn file_part(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        BOUNDARY, field, file_name, content_type,
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn text_part(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n--{}--\r\n",
        BOUNDARY, field, value, BOUNDARY,
    )
    .into_bytes()
}

async fn post_upload(app: &TestClient<impl Endpoint>, body: Vec<u8>) -> TestResponse {
    app.post("/upload")
        .content_type(format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(body)
        .send()
        .await
}

async fn json_body(res: TestResponse) -> anyhow::Result<Value> {
    res.0
        .into_body()
        .into_json::<Value>()
        .await
        .map_err(|e| anyhow!("response body is not json: {}", e))
}

async fn listed_images(app: &TestClient<impl Endpoint>) -> anyhow::Result<Vec<Value>> {
    let res = app.get("/images").send().await;
    res.assert_status(StatusCode::OK);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "Images fetched successfully");
    Ok(body["data"].as_array().cloned().unwrap_or_default())
}

#[tokio::test]
async fn test_list_is_empty_without_uploads() -> anyhow::Result<()> {
    let (_dir, app) = filesystem_environment()?;

    let images = listed_images(&app).await?;
    assert!(images.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_png_upload_then_list() -> anyhow::Result<()> {
    let (dir, app) = filesystem_environment()?;

    let png = encode_test_image(ImageFormat::Png, 10, 10);
    let res = post_upload(&app, file_part("file", "tiny.png", "image/png", &png)).await;
    res.assert_status(StatusCode::OK);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "File uploaded successfully");

    let url = body["uploaded"]["url"].as_str().unwrap_or_default();
    let public_id = body["uploaded"]["public_id"].as_str().unwrap_or_default();
    assert!(public_id.starts_with("file_"));
    assert_eq!(url, format!("{}/images-folder/{}.png", PUBLIC_URL, public_id));

    let stored = image::open(dir.path().join(format!("images-folder/{}.png", public_id)))?;
    assert_eq!((stored.width(), stored.height()), (100, 100));

    let images = listed_images(&app).await?;
    assert_eq!(images, vec![body["uploaded"].clone()]);

    Ok(())
}

#[tokio::test]
async fn test_list_returns_every_upload() -> anyhow::Result<()> {
    let provider = Arc::new(CountingProvider::default());
    let app = setup_environment(provider.clone(), Arc::new(MemoryBackend::default()));

    let mut uploaded = vec![];
    for _ in 0..3 {
        let res = post_upload(&app, file_part("file", "a.jpg", "image/jpeg", b"jpeg-bytes")).await;
        res.assert_status(StatusCode::OK);
        uploaded.push(json_body(res).await?["uploaded"].clone());

        // Keys are millisecond timestamps.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let images = listed_images(&app).await?;
    assert_eq!(images, uploaded);
    assert_eq!(provider.uploads.load(Ordering::SeqCst), 3);

    Ok(())
}

#[tokio::test]
async fn test_non_image_never_reaches_provider() -> anyhow::Result<()> {
    let provider = Arc::new(CountingProvider::default());
    let app = setup_environment(provider.clone(), Arc::new(MemoryBackend::default()));

    let res = post_upload(&app, file_part("file", "notes.txt", "text/plain", b"hello")).await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "Not an image! Please upload an image");
    assert_eq!(provider.uploads.load(Ordering::SeqCst), 0);
    assert!(listed_images(&app).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_client_error() -> anyhow::Result<()> {
    let provider = Arc::new(CountingProvider::default());
    let app = setup_environment(provider.clone(), Arc::new(MemoryBackend::default()));

    let res = post_upload(&app, text_part("caption", "no file here")).await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "File upload error");
    assert_eq!(provider.uploads.load(Ordering::SeqCst), 0);
    assert!(listed_images(&app).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_upload_without_multipart_body_is_client_error() -> anyhow::Result<()> {
    let provider = Arc::new(CountingProvider::default());
    let app = setup_environment(provider.clone(), Arc::new(MemoryBackend::default()));

    let res = app.post("/upload").send().await;
    res.assert_status(StatusCode::BAD_REQUEST);
    let body = json_body(res).await?;
    assert_eq!(body["message"], "File upload error");

    let res = app.post("/upload")
        .content_type("application/json")
        .body("{}")
        .send()
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    let body = json_body(res).await?;
    assert_eq!(body["message"], "File upload error");

    assert_eq!(provider.uploads.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_oversized_file_is_rejected() -> anyhow::Result<()> {
    let provider = Arc::new(CountingProvider::default());
    let app = setup_environment(provider.clone(), Arc::new(MemoryBackend::default()));

    let limit = UploadConfig::default().max_upload_size;
    for size in [limit + 1, limit * 2] {
        let data = vec![0u8; size];
        let res = post_upload(&app, file_part("file", "huge.png", "image/png", &data)).await;
        res.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let body = json_body(res).await?;
        assert_eq!(body["message"], "File too large");
    }

    assert_eq!(provider.uploads.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_is_opaque() -> anyhow::Result<()> {
    let store = Arc::new(MemoryBackend::default());
    let app = setup_environment(Arc::new(FailingProvider), store.clone());

    let res = post_upload(&app, file_part("file", "a.png", "image/png", b"png-bytes")).await;
    res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "Internal server error");
    assert!(store.list().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_store_failure_discards_uploaded_asset() -> anyhow::Result<()> {
    let provider = Arc::new(CountingProvider::default());
    let app = setup_environment(provider.clone(), Arc::new(FailingStore));

    let res = post_upload(&app, file_part("file", "a.png", "image/png", b"png-bytes")).await;
    res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "Internal server error");

    let destroyed = provider.destroyed.lock().unwrap().clone();
    assert_eq!(destroyed.len(), 1);
    assert!(destroyed[0].starts_with("file_"));

    Ok(())
}

#[tokio::test]
async fn test_list_failure_is_opaque() -> anyhow::Result<()> {
    let app = setup_environment(Arc::new(CountingProvider::default()), Arc::new(FailingStore));

    let res = app.get("/images").send().await;
    res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(res).await?;
    assert_eq!(body["message"], "Internal server error");

    Ok(())
}

#[test]
fn test_missing_env_file_is_not_an_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let outcome = crate::env_file_outcome(dotenvy::from_path(dir.path().join(".env")));
    assert!(matches!(outcome, Ok(None)));

    Ok(())
}

#[test]
fn test_malformed_env_file_is_reported() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".env");
    std::fs::write(&path, "BROKEN LINE WITHOUT EQUALS\n")?;

    let outcome = crate::env_file_outcome(dotenvy::from_path(&path));
    assert!(matches!(outcome, Err(dotenvy::Error::LineParse(..))));

    Ok(())
}
