pub mod manager;
pub mod memory;
pub mod models;
pub mod mongo;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use store::{Collection, DocumentStore, StoreError, UpdateOutcome};
