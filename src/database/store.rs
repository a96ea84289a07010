use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use thiserror::Error;

/// Collections owned by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Scholarships,
    Applications,
    Payments,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Scholarships => "scholarships",
            Collection::Applications => "appliedScholarships",
            Collection::Payments => "payments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "users" => Some(Collection::Users),
            "scholarships" => Some(Collection::Scholarships),
            "appliedScholarships" => Some(Collection::Applications),
            "payments" => Some(Collection::Payments),
            _ => None,
        }
    }
}

/// Errors from a DocumentStore
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

/// Outcome of a single-document update, mirroring the driver's UpdateResult
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

impl UpdateOutcome {
    pub fn upserted(&self) -> bool {
        self.upserted_id.is_some()
    }
}

/// Document collections with query, write and aggregation primitives.
///
/// Filters are equality documents, updates are `$set` documents and
/// pipelines use the subset of stages the services issue. Implementations
/// must be safe to share across concurrent requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, coll: Collection, filter: Document) -> Result<Option<Document>, StoreError>;

    async fn find_many(&self, coll: Collection, filter: Document) -> Result<Vec<Document>, StoreError>;

    /// Insert one document and return its `_id`.
    async fn insert_one(&self, coll: Collection, doc: Document) -> Result<Bson, StoreError>;

    async fn update_one(
        &self,
        coll: Collection,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Delete at most one document and return the deleted count.
    async fn delete_one(&self, coll: Collection, filter: Document) -> Result<u64, StoreError>;

    async fn aggregate(&self, coll: Collection, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError>;

    async fn ensure_unique_index(&self, coll: Collection, keys: &[&str]) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
