/// Payment gateway client
///
/// Creates hosted checkout sessions for block purchases. Confirmation never
/// comes from this client; the gateway calls back on the webhook route.
use super::ClientError;
use crate::config::PaymentGatewayConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub purchase_id: Uuid,
    pub creator_id: Uuid,
    pub amount_cents: i64,
    pub description: String,
    /// Echoed back by the gateway as the external reference
    pub idempotency_key: Uuid,
    pub return_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub external_reference: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ClientError>;
}

/// HTTP implementation against the gateway REST API
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentGatewayConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ClientError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let session = response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if session.checkout_url.is_empty() {
            return Err(ClientError::Decode(
                "checkout session without checkout_url".to_string(),
            ));
        }

        Ok(session)
    }
}
