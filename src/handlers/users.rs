use axum::extract::{Path, State};
use serde_json::{json, Map, Value};

use crate::api::{document_to_api_value, documents_to_api_array};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::{body_document, body_map, JsonBody};

/// GET /users/role/:email - `{role}`, with `role` omitted for unknown users
pub async fn get_role(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<Value> {
    let mut body = Map::new();
    if let Some(role) = state.users().get_role(&email).await? {
        body.insert("role".into(), Value::String(role));
    }
    Ok(ApiResponse::success(Value::Object(body)))
}

/// POST /users/:email - register the user unless already known
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    body: JsonBody,
) -> ApiResult<Value> {
    let profile = body_document(body)?;
    let user = state.users().upsert_user(&email, profile).await?;
    Ok(ApiResponse::success(document_to_api_value(user)))
}

/// GET /users - every user
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Value> {
    let users = state.users().list_users().await?;
    Ok(ApiResponse::success(documents_to_api_array(users)))
}

/// PATCH /update-role/:id
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: JsonBody,
) -> ApiResult<Value> {
    let body = body_map(body)?;
    let role = body.get("role").and_then(Value::as_str);
    state.users().update_role(&id, role).await?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": "Role updated successfully",
    })))
}

/// DELETE /users/delete/:id - an unknown id is a 400
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    state
        .users()
        .delete_user(&id)
        .await
        .map_err(|e| ApiError::from(e).not_found_as_bad_request())?;
    Ok(ApiResponse::success(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}
