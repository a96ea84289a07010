use std::str::FromStr;
use std::sync::Arc;

use mongodb::bson::{Bson, DateTime, Document};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, instrument};

use crate::database::models::{PAYMENT_INTENT_REQUIRED_FIELDS, PAYMENT_REQUIRED_FIELDS};
use crate::database::{Collection, DocumentStore};

use super::payment_gateway::{PaymentGateway, PaymentIntentRequest};
use super::{require_fields, ServiceError, ServiceResult};

/// Parse an application fee given as a JSON number or a numeric string.
fn parse_fee(value: Option<&Bson>) -> ServiceResult<Decimal> {
    let invalid = || ServiceError::validation("applicationFees must be a positive amount");
    let fee = match value {
        Some(Bson::Double(f)) if f.is_finite() => Decimal::from_str(&f.to_string()).map_err(|_| invalid())?,
        Some(Bson::Int32(n)) => Decimal::from(*n),
        Some(Bson::Int64(n)) => Decimal::from(*n),
        Some(Bson::String(s)) => Decimal::from_str(s.trim()).map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if fee <= Decimal::ZERO {
        return Err(invalid());
    }
    Ok(fee)
}

/// Whole minor units (cents), rounding half away from zero.
pub fn to_minor_units(fee: Decimal) -> Option<i64> {
    fee.checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn scholarship_reference(value: Option<&Bson>) -> String {
    match value {
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

pub struct PaymentService {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl PaymentService {
    pub fn new(store: Arc<dyn DocumentStore>, gateway: Arc<dyn PaymentGateway>, currency: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            currency: currency.into(),
        }
    }

    /// Append a completed payment and return its id.
    #[instrument(skip(self, fields))]
    pub async fn record_payment(&self, mut fields: Document) -> ServiceResult<Bson> {
        require_fields(&fields, &PAYMENT_REQUIRED_FIELDS)?;
        fields.remove("_id");
        fields.insert("createdAt", DateTime::now());

        let id = self.store.insert_one(Collection::Payments, fields).await?;
        info!("Recorded payment {}", id);
        Ok(id)
    }

    /// Create a payment intent for the application fee and return the client secret.
    #[instrument(skip(self, fields))]
    pub async fn create_payment_intent(&self, fields: &Document) -> ServiceResult<String> {
        require_fields(fields, &PAYMENT_INTENT_REQUIRED_FIELDS)?;
        let fee = parse_fee(fields.get("applicationFees"))?;
        let amount_minor = to_minor_units(fee)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| ServiceError::validation("applicationFees is out of range"))?;

        let request = PaymentIntentRequest {
            amount_minor,
            currency: self.currency.clone(),
            scholarship_id: scholarship_reference(fields.get("scholarshipId")),
        };
        Ok(self.gateway.create_payment_intent(request).await?)
    }
}
