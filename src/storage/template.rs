use async_trait::async_trait;

use crate::context::ImageRecord;

#[async_trait]
pub trait RecordStore: Sync + Send + 'static {
    /// Persists a single record, returning it once written.
    async fn insert(&self, record: ImageRecord) -> anyhow::Result<ImageRecord>;

    /// Fetches every record in the order they were inserted.
    async fn list(&self) -> anyhow::Result<Vec<ImageRecord>>;
}
