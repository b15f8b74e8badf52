use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{GatewayOrder, PaymentGateway};
use crate::config::PaymentConfig;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

/// Client for a Razorpay-compatible orders API, authenticated with basic
/// auth (`key_id:key_secret`).
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> AppResult<GatewayOrder> {
        let resp = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                amount: amount_minor,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("reading body failed: {e}")))?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Gateway rejected order creation");
            return Err(AppError::GatewayUnavailable(format!(
                "gateway returned status {status}"
            )));
        }

        let created: CreateOrderResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::GatewayUnavailable(format!("invalid gateway response: {e}"))
        })?;

        info!(gateway_order_id = %created.id, amount = created.amount, "Gateway order created");

        Ok(GatewayOrder {
            id: created.id,
            amount: created.amount,
            currency: created.currency,
        })
    }
}
