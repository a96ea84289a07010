use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::PaymentConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Payment gateway response missing client secret")]
    MissingClientSecret,
}

/// Payment intent request in minor currency units
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub scholarship_id: String,
}

/// External service that creates payment intents and returns the secret the
/// browser uses to confirm them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<String, GatewayError>;
}

/// Stripe payment-intent API client
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self), fields(amount = request.amount_minor, currency = %request.currency))]
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<String, GatewayError> {
        if self.secret_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        let amount = request.amount_minor.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", request.currency.as_str()),
            ("payment_method_types[]", "card"),
            ("metadata[scholarshipId]", request.scholarship_id.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let intent: IntentResponse = response.json().await?;
        info!("Created payment intent {}", intent.id);
        intent.client_secret.ok_or(GatewayError::MissingClientSecret)
    }
}
