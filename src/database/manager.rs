use std::sync::Arc;
use std::time::Duration;

use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::Client;
use thiserror::Error;
use tracing::info;

use crate::config::{ApplicationUniqueness, ConsistencyConfig, DatabaseConfig, StoreBackend};

use super::memory::MemoryStore;
use super::mongo::MongoStore;
use super::store::{Collection, DocumentStore, StoreError};

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

enum Backend {
    Mongo(MongoStore),
    Memory(MemoryStore),
}

/// Owns the process-wide store handle from startup until shutdown
pub struct DatabaseManager {
    backend: Backend,
}

impl DatabaseManager {
    /// Connect to the configured backend. Called once at startup.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let backend = match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Backend::Memory(MemoryStore::new())
            }
            StoreBackend::Mongo => {
                let connection_string = Self::build_connection_string(config)?;
                let mut options = ClientOptions::parse(&connection_string).await?;
                options.app_name = Some(config.app_name.clone());
                options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
                options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
                options.server_api = Some(
                    ServerApi::builder()
                        .version(ServerApiVersion::V1)
                        .strict(true)
                        .deprecation_errors(true)
                        .build(),
                );
                let client = Client::with_options(options)?;
                info!("Created MongoDB client for database: {}", config.name);
                Backend::Mongo(MongoStore::new(client, &config.name))
            }
        };
        Ok(Self { backend })
    }

    /// Shared handle injected into every service
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        match &self.backend {
            Backend::Mongo(store) => Arc::new(store.clone()),
            Backend::Memory(store) => Arc::new(store.clone()),
        }
    }

    /// Build the MongoDB URI, either verbatim from config or from the
    /// credential parts (user, password, cluster host).
    pub fn build_connection_string(config: &DatabaseConfig) -> Result<String, DatabaseError> {
        if let Some(uri) = &config.uri {
            return Ok(uri.clone());
        }

        let user = config
            .user
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("MONGODB_URI or DB_USER"))?;
        let password = config
            .password
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("MONGODB_URI or DB_PASS"))?;

        let mut url = url::Url::parse(&format!("mongodb+srv://{}/", config.host))
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_username(user).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_password(Some(password)).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.query_pairs_mut()
            .append_pair("retryWrites", "true")
            .append_pair("w", "majority")
            .append_pair("appName", &config.app_name);
        Ok(url.into())
    }

    /// Create the unique indexes the services rely on.
    pub async fn ensure_indexes(
        store: &dyn DocumentStore,
        consistency: &ConsistencyConfig,
    ) -> Result<(), StoreError> {
        store.ensure_unique_index(Collection::Users, &["email"]).await?;
        if consistency.application_uniqueness == ApplicationUniqueness::Atomic {
            store
                .ensure_unique_index(Collection::Applications, &["scholarshipId", "userEmail"])
                .await?;
        }
        info!("Ensured unique indexes");
        Ok(())
    }

    /// Pings the store to ensure connectivity
    pub async fn health_check(store: &dyn DocumentStore) -> Result<(), StoreError> {
        store.ping().await
    }

    /// Release the store handle. Outstanding clones of the handle stay usable
    /// until dropped.
    pub async fn shutdown(self) {
        match self.backend {
            Backend::Mongo(store) => {
                store.shutdown().await;
                info!("MongoDB client shut down");
            }
            Backend::Memory(_) => {}
        }
    }
}
