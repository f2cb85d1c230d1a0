use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::context::ImageRecord;
use crate::RecordStore;

/// Keeps records in process memory.
///
/// Nothing survives a restart, this is meant for local runs and tests.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<Vec<ImageRecord>>,
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn insert(&self, record: ImageRecord) -> anyhow::Result<ImageRecord> {
        debug!("Storing image record {:?} in memory", &record);
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> anyhow::Result<Vec<ImageRecord>> {
        Ok(self.records.read().await.clone())
    }
}
