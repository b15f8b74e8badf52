use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::services::order_lifecycle::{CreateOrder, QuoteRequest, VerifyPayment};
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{created, success};
use crate::AppState;

pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> AppResult<Response> {
    let quote = state.orders.quote(request).await?;
    Ok(success(quote, "Order total calculated"))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrder>,
) -> AppResult<Response> {
    let checkout = state.orders.create_order(request).await?;
    Ok(created(checkout, "Order created"))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPayment>,
) -> AppResult<Response> {
    let order = state.orders.verify_payment(request).await?;

    match order.status {
        OrderStatus::Successful => Ok(success(order, "Payment verified")),
        _ => Err(AppError::InvalidSignature),
    }
}

pub async fn mark_failed(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Response> {
    let order = state.orders.mark_failed(order_id).await?;
    Ok(success(order, "Order marked as failed"))
}

pub async fn buyer_orders(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> AppResult<Response> {
    let orders = state.orders.orders_for_buyer(&external_id).await?;
    Ok(success(orders, "Orders retrieved"))
}
