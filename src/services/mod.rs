pub mod application_service;
pub mod error;
pub mod payment_gateway;
pub mod payment_service;
pub mod scholarship_service;
pub mod user_service;

pub use application_service::ApplicationService;
pub use error::{ServiceError, ServiceResult};
pub use payment_gateway::{GatewayError, PaymentGateway, PaymentIntentRequest, StripeGateway};
pub use payment_service::PaymentService;
pub use scholarship_service::ScholarshipService;
pub use user_service::UserService;

use mongodb::bson::{oid::ObjectId, Bson, Document};

/// A field counts as missing when it is absent, null or an empty string.
fn is_missing(doc: &Document, field: &str) -> bool {
    match doc.get(field) {
        None | Some(Bson::Null) => true,
        Some(Bson::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Fail with a validation error naming every missing field.
pub(crate) fn require_fields(doc: &Document, fields: &[&str]) -> ServiceResult<()> {
    let missing: Vec<&str> = fields.iter().copied().filter(|f| is_missing(doc, f)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

pub(crate) fn parse_object_id(id: &str) -> ServiceResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| ServiceError::validation(format!("Invalid id: {}", id)))
}
