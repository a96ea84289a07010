use axum::extract::State;
use serde_json::{json, Value};

use crate::api::bson_to_api_value;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

use super::{body_document, JsonBody};

/// POST /enroll/payments
pub async fn record_payment(State(state): State<AppState>, body: JsonBody) -> ApiResult<Value> {
    let fields = body_document(body)?;
    let id = state.payments().record_payment(fields).await?;
    Ok(ApiResponse::created(json!({
        "success": true,
        "message": "Payment recorded successfully",
        "insertedId": bson_to_api_value(id),
    })))
}

/// POST /api/create-payment-intent - `{clientSecret}` for the browser to confirm
pub async fn create_payment_intent(State(state): State<AppState>, body: JsonBody) -> ApiResult<Value> {
    let fields = body_document(body)?;
    let client_secret = state.payments().create_payment_intent(&fields).await?;
    Ok(ApiResponse::success(json!({ "clientSecret": client_secret })))
}
