use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection, Database};

use crate::context::ImageRecord;
use crate::RecordStore;

/// Used when neither the config nor the URI name a database.
const DEFAULT_DATABASE: &str = "imageUpload";

pub struct MongoBackend {
    collection: Collection<ImageRecord>,
}

impl MongoBackend {
    pub async fn connect(
        uri: &str,
        database: Option<&str>,
        collection: &str,
    ) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        let db = select_database(&client, database);

        // The client connects lazily, ping so a bad address fails at startup.
        db.run_command(doc! { "ping": 1 }, None).await?;
        info!("MongoDB connected successfully, using {}.{}", db.name(), collection);

        Ok(Self {
            collection: db.collection(collection),
        })
    }
}

/// Picks the configured database, then the one named in the URI,
/// then the default.
fn select_database(client: &Client, database: Option<&str>) -> Database {
    match database {
        Some(name) => client.database(name),
        None => client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
    }
}

#[async_trait]
impl RecordStore for MongoBackend {
    async fn insert(&self, record: ImageRecord) -> anyhow::Result<ImageRecord> {
        debug!("Inserting image record {:?}", &record);
        let result = self.collection.insert_one(&record, None).await?;
        debug!("Inserted image record with _id {}", result.inserted_id);

        Ok(record)
    }

    async fn list(&self) -> anyhow::Result<Vec<ImageRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .build();

        let records = self.collection
            .find(None, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;

        debug!("Fetched {} image records", records.len());
        Ok(records)
    }
}
