use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::auth::{cleared_session_cookie, generate_jwt, session_cookie, Claims};
use crate::error::ApiError;
use crate::services::ServiceError;
use crate::state::AppState;

use super::{body_map, JsonBody};

/// POST /jwt - sign the posted identity and set it as the session cookie
pub async fn issue_token(State(state): State<AppState>, body: JsonBody) -> Result<impl IntoResponse, ApiError> {
    let security = &state.config.security;
    let claims = Claims::new(body_map(body)?, security.token_ttl_hours);

    let token = generate_jwt(&claims, &security.jwt_secret).map_err(ServiceError::from)?;
    let cookie = session_cookie(&token, security).map_err(ServiceError::from)?;

    if let Some(email) = claims.identity.get("email").and_then(|v| v.as_str()) {
        info!("Issued session token for {}", email);
    }
    Ok(([(SET_COOKIE, cookie)], Json(json!({ "success": true }))))
}

/// GET /logOut - clear the session cookie
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cookie = cleared_session_cookie(&state.config.security).map_err(ServiceError::from)?;
    Ok(([(SET_COOKIE, cookie)], Json(json!({ "success": true }))))
}
