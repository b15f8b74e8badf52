use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "discount_kind", rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "usage_limit", rename_all = "snake_case")]
pub enum UsageLimit {
    Unlimited,
    OncePerUser,
    OncePerMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(type_name = "coupon_user_type", rename_all = "camelCase")]
pub enum UserType {
    All,
    NewUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    /// Always stored uppercased.
    pub code: String,
    pub discount_value: Decimal,
    pub discount_kind: DiscountKind,
    pub min_purchase: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
    pub applicable_events: Vec<Uuid>,
    pub applicable_categories: Vec<Uuid>,
    pub usage_limit: UsageLimit,
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Inclusive on both ends.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_to
    }

    pub fn is_unrestricted(&self) -> bool {
        self.applicable_events.is_empty() && self.applicable_categories.is_empty()
    }

    /// Listing predicate: active, in window, and matching the event OR the
    /// category (or carrying no restriction at all).
    ///
    /// Validation enforces the two restriction lists independently instead;
    /// see `services::coupon_validator::check_coupon`.
    pub fn is_listed_for(&self, event_id: Uuid, category_id: Uuid, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.is_within_window(now)
            && (self.is_unrestricted()
                || self.applicable_events.contains(&event_id)
                || self.applicable_categories.contains(&category_id))
    }

    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        compute_discount(self.discount_kind, self.discount_value, subtotal)
    }
}

/// Discount for a subtotal, capped so the discounted amount never goes
/// below zero.
pub fn compute_discount(kind: DiscountKind, value: Decimal, subtotal: Decimal) -> Decimal {
    let raw = match kind {
        // An overflowing product is larger than the subtotal anyway.
        DiscountKind::Percentage => subtotal
            .checked_mul(value)
            .map(|v| v / Decimal::ONE_HUNDRED)
            .unwrap_or(subtotal),
        DiscountKind::Fixed => value,
    };
    raw.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO))
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Admin payload for creating a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_value: Decimal,
    pub discount_kind: DiscountKind,
    #[serde(default)]
    pub min_purchase: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub applicable_events: Vec<Uuid>,
    #[serde(default)]
    pub applicable_categories: Vec<Uuid>,
    #[serde(default = "default_usage_limit")]
    pub usage_limit: UsageLimit,
    #[serde(default = "default_user_type")]
    pub user_type: UserType,
}

fn default_true() -> bool {
    true
}

fn default_usage_limit() -> UsageLimit {
    UsageLimit::Unlimited
}

fn default_user_type() -> UserType {
    UserType::All
}

impl NewCoupon {
    pub fn into_coupon(self, now: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: normalize_code(&self.code),
            discount_value: self.discount_value,
            discount_kind: self.discount_kind,
            min_purchase: self.min_purchase,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            is_active: self.is_active,
            applicable_events: self.applicable_events,
            applicable_categories: self.applicable_categories,
            usage_limit: self.usage_limit,
            user_type: self.user_type,
            created_at: now,
        }
    }
}
