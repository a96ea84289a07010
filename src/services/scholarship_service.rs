use std::sync::Arc;

use mongodb::bson::{doc, Bson, Document};
use tracing::{info, instrument};

use crate::database::{Collection, DocumentStore, UpdateOutcome};

use super::{parse_object_id, ServiceError, ServiceResult};

pub struct ScholarshipService {
    store: Arc<dyn DocumentStore>,
    upsert_on_update: bool,
}

impl ScholarshipService {
    pub fn new(store: Arc<dyn DocumentStore>, upsert_on_update: bool) -> Self {
        Self {
            store,
            upsert_on_update,
        }
    }

    /// Insert a scholarship and return the generated id. A client-supplied
    /// `_id` is discarded.
    #[instrument(skip(self, fields))]
    pub async fn create(&self, mut fields: Document) -> ServiceResult<Bson> {
        fields.remove("_id");
        let id = self.store.insert_one(Collection::Scholarships, fields).await?;
        info!("Created scholarship {}", id);
        Ok(id)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Document>> {
        Ok(self.store.find_many(Collection::Scholarships, doc! {}).await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Document> {
        let oid = parse_object_id(id)?;
        self.store
            .find_one(Collection::Scholarships, doc! { "_id": oid })
            .await?
            .ok_or_else(|| ServiceError::not_found("Scholarship not found"))
    }

    /// `$set` the given fields on the scholarship. When upsert is enabled an
    /// unknown id creates a new scholarship at that id.
    #[instrument(skip(self, fields))]
    pub async fn update(&self, id: &str, mut fields: Document) -> ServiceResult<UpdateOutcome> {
        let oid = parse_object_id(id)?;
        fields.remove("_id");
        if fields.is_empty() {
            return Err(ServiceError::validation("No fields to update"));
        }

        let outcome = self
            .store
            .update_one(
                Collection::Scholarships,
                doc! { "_id": oid },
                doc! { "$set": fields },
                self.upsert_on_update,
            )
            .await?;

        if outcome.matched_count == 0 && !outcome.upserted() {
            return Err(ServiceError::not_found("Scholarship not found"));
        }
        if outcome.upserted() {
            info!("Created scholarship {} through update", id);
        } else {
            info!("Updated scholarship {}", id);
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        let oid = parse_object_id(id)?;
        let deleted = self
            .store
            .delete_one(Collection::Scholarships, doc! { "_id": oid })
            .await?;
        if deleted == 0 {
            return Err(ServiceError::not_found("Scholarship not found"));
        }
        info!("Deleted scholarship {}", id);
        Ok(())
    }
}
