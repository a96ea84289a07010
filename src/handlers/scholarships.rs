use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::api::{bson_to_api_value, document_to_api_value, documents_to_api_array};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::{body_document, JsonBody};

/// POST /scholarship - insert result `{acknowledged, insertedId}`
pub async fn create(State(state): State<AppState>, body: JsonBody) -> ApiResult<Value> {
    let fields = body_document(body)?;
    let id = state.scholarships().create(fields).await?;
    Ok(ApiResponse::success(json!({
        "acknowledged": true,
        "insertedId": bson_to_api_value(id),
    })))
}

/// GET /scholarship
pub async fn list(State(state): State<AppState>) -> ApiResult<Value> {
    let scholarships = state.scholarships().list().await?;
    Ok(ApiResponse::success(documents_to_api_array(scholarships)))
}

/// GET /scholarship/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let scholarship = state.scholarships().get(&id).await?;
    Ok(ApiResponse::success(document_to_api_value(scholarship)))
}

/// PUT /scholarship/update/:id - update result in the driver's shape
pub async fn update(State(state): State<AppState>, Path(id): Path<String>, body: JsonBody) -> ApiResult<Value> {
    let fields = body_document(body)?;
    let outcome = state.scholarships().update(&id, fields).await?;
    Ok(ApiResponse::success(json!({
        "acknowledged": true,
        "matchedCount": outcome.matched_count,
        "modifiedCount": outcome.modified_count,
        "upsertedCount": if outcome.upserted() { 1 } else { 0 },
        "upsertedId": outcome.upserted_id.map(bson_to_api_value),
    })))
}

/// DELETE /delete/scholarship/:id - an unknown id is a 400
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    state
        .scholarships()
        .delete(&id)
        .await
        .map_err(|e| ApiError::from(e).not_found_as_bad_request())?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": "Scholarship deleted successfully",
    })))
}
