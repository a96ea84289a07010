use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::state::AppState;

/// GET / - plain-text banner
pub async fn root() -> &'static str {
    "Scholarship Management Server is running!"
}

/// GET /health - store connectivity, 503 when the store does not answer
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    DatabaseManager::health_check(state.store.as_ref()).await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("Database unavailable")
    })?;

    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "database": "ok",
    })))
}
