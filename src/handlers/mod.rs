// Route handlers, one module per resource. Each handler extracts the request,
// calls a service and shapes the JSON reply.
pub mod applications;
pub mod auth;
pub mod payments;
pub mod scholarships;
pub mod system;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use mongodb::bson::Document;
use serde_json::{Map, Value};

use crate::api::json_to_document;
use crate::error::ApiError;

/// JSON object body. A request without a JSON body is read as `{}` so that
/// required-field checks report what is missing; a body that is not a JSON
/// object is a 400.
pub type JsonBody = Result<Json<Map<String, Value>>, JsonRejection>;

pub(crate) fn body_map(body: JsonBody) -> Result<Map<String, Value>, ApiError> {
    match body {
        Ok(Json(map)) => Ok(map),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Map::new()),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

pub(crate) fn body_document(body: JsonBody) -> Result<Document, ApiError> {
    json_to_document(body_map(body)?).map_err(ApiError::bad_request)
}
