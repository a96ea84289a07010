use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::api::{bson_to_api_value, documents_to_api_array};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::{body_document, JsonBody};

/// POST /applied-scholarship - 201 with the new application id
pub async fn apply(State(state): State<AppState>, body: JsonBody) -> ApiResult<Value> {
    let fields = body_document(body)?;
    let id = state.applications().apply(fields).await?;
    Ok(ApiResponse::created(json!({ "insertedId": bson_to_api_value(id) })))
}

/// GET /applied-scholarship/:email - the user's applications with scholarship details
pub async fn applied_scholarships(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<Value> {
    let rows = state.applications().applied_scholarships(&email).await?;
    Ok(ApiResponse::success(documents_to_api_array(rows)))
}

/// DELETE /applied-scholarship/:id - cancel an application
pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    state.applications().cancel(&id).await?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": "Application cancelled successfully",
    })))
}
