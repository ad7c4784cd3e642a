//! Minimal client for the Stripe Payment Intents API.
//!
//! Only the two calls the checkout flow needs: creating an intent sized
//! to the server-computed cart total, and retrieving an intent to verify
//! that the payment actually succeeded before an order is materialized.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::StripeConfig;

/// Terminal state a payment intent must reach before order creation.
pub const STATUS_SUCCEEDED: &str = "succeeded";

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    /// Amount in minor units (cents).
    pub amount: i64,
    pub client_secret: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        session_id: &str,
    ) -> Result<PaymentIntent, StripeError> {
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("metadata[session_id]", session_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        Self::parse_intent(resp).await
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, StripeError> {
        let resp = self
            .http
            .get(format!("{}/v1/payment_intents/{id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::parse_intent(resp).await
    }

    async fn parse_intent(resp: reqwest::Response) -> Result<PaymentIntent, StripeError> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<PaymentIntent>(&body)
            .map_err(|err| StripeError::InvalidResponse(format!("{err}; body={body}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payment_intent_payload() {
        let body = r#"{
            "id": "pi_3Nv0x2EZ",
            "object": "payment_intent",
            "amount": 2700,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_3Nv0x2EZ_secret_abc",
            "metadata": {"session_id": "sess-1"}
        }"#;

        let intent: PaymentIntent = serde_json::from_str(body).unwrap();
        assert_eq!(intent.id, "pi_3Nv0x2EZ");
        assert_eq!(intent.amount, 2700);
        assert_eq!(intent.status, STATUS_SUCCEEDED);
        assert_eq!(intent.client_secret.as_deref(), Some("pi_3Nv0x2EZ_secret_abc"));
    }

    #[test]
    fn client_secret_may_be_absent_on_retrieval() {
        let body = r#"{"id": "pi_1", "amount": 100, "status": "processing"}"#;
        let intent: PaymentIntent = serde_json::from_str(body).unwrap();
        assert!(intent.client_secret.is_none());
        assert_ne!(intent.status, STATUS_SUCCEEDED);
    }
}
