use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Coupon, NewCoupon};
use crate::utils::error::AppResult;
use crate::utils::response::{created, success};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub event_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: Decimal,
    pub event_id: Uuid,
    pub buyer_id: String,
}

#[derive(Debug, Serialize)]
pub struct ValidatedCoupon {
    pub coupon: Coupon,
    pub discount_amount: Decimal,
}

pub async fn list_available(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> AppResult<Response> {
    let coupons = state
        .coupons
        .list_available(query.event_id, query.category_id)
        .await?;

    let message = if coupons.is_empty() {
        "No coupons available for this event"
    } else {
        "Available coupons retrieved"
    };
    Ok(success(coupons, message))
}

pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> AppResult<Response> {
    let coupon = state
        .coupons
        .validate(
            &request.code,
            request.subtotal,
            request.event_id,
            &request.buyer_id,
        )
        .await?;

    let discount_amount = coupon.discount_for(request.subtotal);
    Ok(success(
        ValidatedCoupon {
            coupon,
            discount_amount,
        },
        "Coupon applied",
    ))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(new_coupon): Json<NewCoupon>,
) -> AppResult<Response> {
    let coupon = state.coupons.create_coupon(new_coupon).await?;
    Ok(created(coupon, "Coupon created"))
}
