#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use scholarship_api::config::{AppConfig, ApplicationUniqueness, StoreBackend};
use scholarship_api::database::{DatabaseManager, DocumentStore, MemoryStore};
use scholarship_api::services::{GatewayError, PaymentGateway, PaymentIntentRequest};
use scholarship_api::{app, AppState};

/// Gateway double that records every intent request.
#[derive(Default)]
pub struct RecordingGateway {
    pub requests: Mutex<Vec<PaymentIntentRequest>>,
    pub fail: bool,
}

impl RecordingGateway {
    pub fn requests(&self) -> Vec<PaymentIntentRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<String, GatewayError> {
        if self.fail {
            return Err(GatewayError::Rejected {
                status: 402,
                message: "card declined".into(),
            });
        }
        let secret = format!("pi_{}_secret", request.amount_minor);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Ok(secret)
    }
}

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub gateway: Arc<RecordingGateway>,
    pub store: Arc<dyn DocumentStore>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StoreBackend::Memory;
    config.security.jwt_secret = "test-secret".into();
    config
}

/// Start the router in-process on a free port, backed by a fresh MemoryStore.
pub async fn spawn_with(config: AppConfig, gateway: RecordingGateway) -> Result<TestServer> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    DatabaseManager::ensure_indexes(store.as_ref(), &config.consistency).await?;

    let gateway = Arc::new(gateway);
    let state = AppState::new(store.clone(), gateway.clone(), config);

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });

    Ok(TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        gateway,
        store,
    })
}

pub async fn spawn() -> Result<TestServer> {
    spawn_with(test_config(), RecordingGateway::default()).await
}

pub async fn spawn_with_uniqueness(mode: ApplicationUniqueness) -> Result<TestServer> {
    let mut config = test_config();
    config.consistency.application_uniqueness = mode;
    spawn_with(config, RecordingGateway::default()).await
}

/// POST /scholarship and return the new id.
pub async fn create_scholarship(server: &TestServer, body: Value) -> Result<String> {
    let res = server.client.post(server.url("/scholarship")).json(&body).send().await?;
    anyhow::ensure!(res.status().is_success(), "create scholarship failed: {}", res.status());
    let body: Value = res.json().await?;
    body["insertedId"]
        .as_str()
        .map(str::to_string)
        .context("insertedId missing")
}
