use std::sync::Arc;
use bytes::Bytes;
use poem::middleware::Tracing;
use poem::{Endpoint, EndpointExt, Route};
use poem_openapi::payload::Json;
use poem_openapi::types::multipart::Upload;
use poem_openapi::{ApiResponse, Multipart, OpenApi, OpenApiService};
use tokio::io::AsyncReadExt;

use crate::context::{ImagesListing, Message, UploadedInfo};
use crate::controller::ImageController;
use crate::upload::{IncomingFile, UploadError};

/// The multipart field files are read from.
const FILE_FIELD: &str = "file";

#[derive(Multipart)]
pub struct UploadPayload {
    /// The image to upload.
    file: Option<Upload>,
}

#[derive(ApiResponse)]
#[oai(bad_request_handler = "upload_bad_request")]
pub enum UploadResponse {
    /// The image was uploaded and its record stored.
    #[oai(status = 200)]
    Ok(Json<UploadedInfo>),

    /// No file was given or the file is not an image.
    #[oai(status = 400)]
    BadRequest(Json<Message>),

    /// The file exceeds the upload limit.
    #[oai(status = 413)]
    PayloadTooLarge(Json<Message>),

    /// The provider or the record store failed.
    #[oai(status = 500)]
    InternalServerError(Json<Message>),
}

/// Bodies that are not a readable multipart form get the same
/// answer as a form without a file.
fn upload_bad_request(err: poem::Error) -> UploadResponse {
    debug!("Rejected malformed upload request: {}", err);
    UploadResponse::BadRequest(Json(Message::new("File upload error")))
}

/// Reads an upload into memory, stopping one byte past `limit` so
/// oversized files are never buffered whole.
async fn read_bounded(upload: Upload, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    upload
        .into_async_read()
        .take(limit as u64 + 1)
        .read_to_end(&mut data)
        .await?;
    Ok(data)
}

#[derive(ApiResponse)]
pub enum ListResponse {
    /// Every stored image record.
    #[oai(status = 200)]
    Ok(Json<ImagesListing>),

    /// The record store failed.
    #[oai(status = 500)]
    InternalServerError(Json<Message>),
}

pub struct ImagesApi {
    controller: Arc<ImageController>,
}

impl ImagesApi {
    pub fn new(controller: Arc<ImageController>) -> Self {
        Self { controller }
    }
}

#[OpenApi]
impl ImagesApi {
    /// Upload Image
    ///
    /// Upload an image under the multipart field `file`. The image is
    /// stored with the provider and a record of it is kept.
    #[oai(path = "/upload", method = "post")]
    pub async fn upload(&self, payload: UploadPayload) -> UploadResponse {
        let upload = match payload.file {
            Some(upload) => upload,
            None => return UploadResponse::BadRequest(Json(Message::new("File upload error"))),
        };

        let file_name = upload.file_name().map(ToString::to_string);
        let content_type = upload.content_type().map(ToString::to_string);
        let data = match read_bounded(upload, self.controller.max_upload_size()).await {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to read uploaded file: {:?}", e);
                return UploadResponse::BadRequest(Json(Message::new("File upload error")));
            },
        };

        let file = IncomingFile {
            field_name: FILE_FIELD.to_string(),
            file_name,
            content_type,
            data: Bytes::from(data),
        };

        match self.controller.upload(file).await {
            Ok(record) => UploadResponse::Ok(Json(UploadedInfo::new(record))),
            Err(e @ UploadError::NotAnImage) => {
                UploadResponse::BadRequest(Json(Message::new(e.to_string())))
            },
            Err(e @ UploadError::TooLarge { .. }) => {
                debug!("Rejected upload: {}", e);
                UploadResponse::PayloadTooLarge(Json(Message::new("File too large")))
            },
            Err(e) => {
                error!("Upload failed: {}", e);
                UploadResponse::InternalServerError(Json(Message::new("Internal server error")))
            },
        }
    }

    /// List Images
    ///
    /// Fetch every stored image record.
    #[oai(path = "/images", method = "get")]
    pub async fn list(&self) -> ListResponse {
        match self.controller.list().await {
            Ok(records) => ListResponse::Ok(Json(ImagesListing::new(records))),
            Err(e) => {
                error!("Failed to list images: {:?}", e);
                ListResponse::InternalServerError(Json(Message::new("Internal server error")))
            },
        }
    }
}

/// Builds the full application, serving the API at the root and
/// its documentation under `/docs`.
pub fn build_app(controller: Arc<ImageController>, server_url: &str) -> impl Endpoint {
    let api = OpenApiService::new(
        ImagesApi::new(controller),
        "Imgdrop API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(server_url);

    let docs = api.redoc();

    Route::new()
        .nest("/docs", docs)
        .nest("/", api)
        .with(Tracing)
}
