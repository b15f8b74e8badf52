use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierName {
    General,
    Premium,
    #[serde(rename = "VIP")]
    Vip,
    #[serde(rename = "Early Bird")]
    EarlyBird,
}

impl TierName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::General => "General",
            TierName::Premium => "Premium",
            TierName::Vip => "VIP",
            TierName::EarlyBird => "Early Bird",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketLine {
    pub tier_name: TierName,
    pub quantity: u32,
    pub price_per_ticket: Decimal,
}

impl TicketLine {
    /// `None` when the line amount overflows.
    pub fn amount(&self) -> Option<Decimal> {
        self.price_per_ticket.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sum of the line amounts; `None` on overflow.
pub fn subtotal_of(lines: &[TicketLine]) -> Option<Decimal> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.amount()?))
}

/// Amounts fixed at checkout; never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub subtotal: Decimal,
    pub processing_fee: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl PaymentDetails {
    /// Total in minor currency units, rounded half away from zero.
    pub fn total_minor_units(&self) -> Option<i64> {
        self.total_amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Successful,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Successful => "successful",
            OrderStatus::Failed => "failed",
        }
    }

    /// Allowed lifecycle moves. Re-writing the current state is allowed so
    /// that retries with identical inputs stay harmless.
    pub fn can_transition(current: OrderStatus, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (current, next),
            (Pending, Successful)
                | (Pending, Failed)
                | (Pending, Pending)
                | (Successful, Successful)
                | (Failed, Failed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers issued by the payment gateway for one checkout attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRef {
    pub order_id: String,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub event_id: Uuid,
    pub buyer_id: Uuid,
    pub coupon_id: Option<Uuid>,
    pub tickets: Vec<TicketLine>,
    pub payment_details: PaymentDetails,
    pub status: OrderStatus,
    pub gateway_ref: GatewayRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
