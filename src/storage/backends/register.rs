use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::RecordStore;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum StoreConfigs {
    MongoDb {
        #[serde(default = "default_uri")]
        uri: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        /// The database to use, if not set the database named
        /// in the URI is used.
        database: Option<String>,

        #[serde(default = "default_collection")]
        collection: String,
    },
    Memory,
}

impl Default for StoreConfigs {
    fn default() -> Self {
        Self::MongoDb {
            uri: default_uri(),
            database: None,
            collection: default_collection(),
        }
    }
}

impl StoreConfigs {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn RecordStore>> {
        match self {
            Self::MongoDb { uri, database, collection } => {
                let backend = super::mongo::MongoBackend::connect(
                    uri,
                    database.as_deref(),
                    collection,
                ).await?;
                Ok(Arc::new(backend))
            },
            Self::Memory => {
                Ok(Arc::new(super::memory::MemoryBackend::default()))
            }
        }
    }
}

fn default_uri() -> String {
    "mongodb://127.0.0.1:27017/imageUpload".to_string()
}

fn default_collection() -> String {
    "images".to_string()
}
