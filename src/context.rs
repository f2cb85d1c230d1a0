use poem_openapi::Object;
use serde::{Deserialize, Serialize};

/// A reference to an image held by the remote provider.
///
/// Records are created once by a successful upload and never
/// modified afterwards.
#[derive(Object, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// The publicly resolvable URL of the stored image.
    pub url: String,

    /// The provider's identifier for the stored asset.
    pub public_id: String,
}

#[derive(Object, Debug)]
pub struct Message {
    /// A human readable description of the outcome.
    message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Object, Debug)]
pub struct UploadedInfo {
    message: String,

    /// The record created for the uploaded image.
    uploaded: ImageRecord,
}

impl UploadedInfo {
    pub fn new(uploaded: ImageRecord) -> Self {
        Self {
            message: "File uploaded successfully".to_string(),
            uploaded,
        }
    }
}

#[derive(Object, Debug)]
pub struct ImagesListing {
    message: String,

    /// Every image record held by the store.
    data: Vec<ImageRecord>,
}

impl ImagesListing {
    pub fn new(data: Vec<ImageRecord>) -> Self {
        Self {
            message: "Images fetched successfully".to_string(),
            data,
        }
    }
}
