use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::AppResult;

pub mod gateway;
pub mod signature;
pub mod webhook;

pub use gateway::HttpPaymentGateway;

/// Order reference issued by the gateway for one checkout attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a gateway-side order. Any failure surfaces as
    /// `AppError::GatewayUnavailable`.
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> AppResult<GatewayOrder>;
}
