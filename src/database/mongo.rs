use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, UpdateOptions};
use mongodb::{Client, Database, IndexModel};

use super::store::{Collection, DocumentStore, StoreError, UpdateOutcome};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// DocumentStore backed by the MongoDB driver
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, database_name: &str) -> Self {
        let db = client.database(database_name);
        Self { client, db }
    }

    fn collection(&self, coll: Collection) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(coll.name())
    }

    /// Release the driver's connection pools.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

fn map_write_error(err: mongodb::error::Error) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE => {
            StoreError::DuplicateKey(we.message.clone())
        }
        ErrorKind::Command(ce) if ce.code == DUPLICATE_KEY_CODE => StoreError::DuplicateKey(ce.message.clone()),
        _ => StoreError::Mongo(err),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(&self, coll: Collection, filter: Document) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(coll).find_one(filter, None).await?)
    }

    async fn find_many(&self, coll: Collection, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self.collection(coll).find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_one(&self, coll: Collection, doc: Document) -> Result<Bson, StoreError> {
        let result = self
            .collection(coll)
            .insert_one(doc, None)
            .await
            .map_err(map_write_error)?;
        Ok(result.inserted_id)
    }

    async fn update_one(
        &self,
        coll: Collection,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let options = UpdateOptions::builder().upsert(upsert).build();
        let result = self
            .collection(coll)
            .update_one(filter, update, options)
            .await
            .map_err(map_write_error)?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, coll: Collection, filter: Document) -> Result<u64, StoreError> {
        let result = self.collection(coll).delete_one(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, coll: Collection, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        let cursor = self.collection(coll).aggregate(pipeline, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ensure_unique_index(&self, coll: Collection, keys: &[&str]) -> Result<(), StoreError> {
        let mut spec = Document::new();
        for key in keys {
            spec.insert(*key, 1);
        }
        let model = IndexModel::builder()
            .keys(spec)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(coll).create_index(model, None).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
