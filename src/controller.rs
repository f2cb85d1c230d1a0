use std::sync::Arc;
use tracing::instrument;

use crate::context::ImageRecord;
use crate::upload::{IncomingFile, UploadAdapter, UploadError};
use crate::RecordStore;

pub struct ImageController {
    adapter: UploadAdapter,
    store: Arc<dyn RecordStore>,
}

impl ImageController {
    pub fn new(adapter: UploadAdapter, store: Arc<dyn RecordStore>) -> Self {
        Self { adapter, store }
    }

    /// Uploads the file to the provider then records it in the store.
    ///
    /// The two steps are not atomic. If the record cannot be written
    /// the uploaded asset is destroyed again on a best effort basis,
    /// should that also fail the asset is left orphaned with the provider.
    #[instrument(skip(self, file), fields(file_name = ?file.file_name))]
    pub async fn upload(&self, file: IncomingFile) -> Result<ImageRecord, UploadError> {
        let asset = self.adapter.store(file).await?;
        info!("Stored asset {} @ {}", &asset.public_id, &asset.url);

        let record = ImageRecord {
            url: asset.url,
            public_id: asset.public_id,
        };

        match self.store.insert(record.clone()).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!("Failed to persist record for {}, discarding asset", &record.public_id);
                if let Err(discard_err) = self.adapter.discard(&record.public_id).await {
                    error!(
                        "Asset {} is orphaned, failed to discard it: {:?}",
                        &record.public_id,
                        discard_err,
                    );
                }

                Err(UploadError::Store(e))
            },
        }
    }

    /// The largest file, in bytes, the adapter accepts.
    #[inline]
    pub fn max_upload_size(&self) -> usize {
        self.adapter.cfg().max_upload_size
    }

    pub async fn list(&self) -> anyhow::Result<Vec<ImageRecord>> {
        self.store.list().await
    }
}
