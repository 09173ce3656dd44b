//! Production HTTP client for the payment processor

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stagepass_types::{Result, StagepassError};
use tracing::{debug, error};

use crate::{CreateIntentRequest, CreateRefundRequest, PaymentIntent, PaymentProcessor, RefundReceipt};

/// Bearer-authenticated JSON client against the processor's REST surface
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    payment_intent_id: String,
}

impl HttpProcessor {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(path, error = %e, "processor request failed");
                StagepassError::processor(format!("request to {path} failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(path, %status, "processor returned error status");
            return Err(StagepassError::processor(format!(
                "{path} returned {status}: {text}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            error!(path, error = %e, "processor returned unexpected shape");
            StagepassError::processor(format!("{path} returned unexpected body: {e}"))
        })
    }
}

#[async_trait]
impl PaymentProcessor for HttpProcessor {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent> {
        debug!(customer = %request.customer, amount = %request.amount, "creating payment intent");
        let response: IntentResponse = self
            .post_json(
                "/v1/intents",
                json!({
                    "amount": request.amount.minor,
                    "currency": request.amount.currency.code(),
                    "customer": request.customer.to_string(),
                    "metadata": request.metadata,
                }),
            )
            .await?;

        Ok(PaymentIntent {
            id: response.id,
            client_secret: response.client_secret,
            amount: request.amount,
        })
    }

    async fn create_refund(&self, request: CreateRefundRequest) -> Result<RefundReceipt> {
        debug!(
            payment_intent_id = %request.payment_intent_id,
            "requesting refund"
        );
        let mut body = json!({
            "payment_intent_id": request.payment_intent_id,
            "reason": request.reason,
        });
        if let Some(amount) = request.amount {
            body["amount"] = json!(amount.minor);
            body["currency"] = json!(amount.currency.code());
        }

        let response: RefundResponse = self.post_json("/v1/refunds", body).await?;

        Ok(RefundReceipt {
            refund_id: response.id,
            payment_intent_id: response.payment_intent_id,
        })
    }
}
