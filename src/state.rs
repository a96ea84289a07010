use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::DocumentStore;
use crate::services::{ApplicationService, PaymentGateway, PaymentService, ScholarshipService, UserService};

/// Shared per-process handles, injected into handlers through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, gateway: Arc<dyn PaymentGateway>, config: AppConfig) -> Self {
        Self {
            store,
            gateway,
            config: Arc::new(config),
        }
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.store.clone())
    }

    pub fn scholarships(&self) -> ScholarshipService {
        ScholarshipService::new(self.store.clone(), self.config.consistency.scholarship_update_upsert)
    }

    pub fn applications(&self) -> ApplicationService {
        ApplicationService::new(self.store.clone(), self.config.consistency.application_uniqueness)
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(
            self.store.clone(),
            self.gateway.clone(),
            self.config.payments.currency.clone(),
        )
    }
}
