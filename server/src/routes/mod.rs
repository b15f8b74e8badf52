use axum::middleware::map_response_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::security::apply_security_headers;
use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{coupons, health_check, orders, webhooks};
use crate::AppState;

pub fn create_routes(state: AppState, allowed_origins: &[String], production: bool) -> Router {
    let api = Router::new()
        .route("/coupons", post(coupons::create_coupon))
        .route("/coupons/available", get(coupons::list_available))
        .route("/coupons/validate", post(coupons::validate_coupon))
        .route("/orders", post(orders::create_order))
        .route("/orders/quote", post(orders::quote))
        .route("/orders/verify", post(orders::verify_payment))
        .route("/orders/:order_id/fail", post(orders::mark_failed))
        .route("/buyers/:external_id/orders", get(orders::buyer_orders))
        .route("/webhooks/payment", post(webhooks::payment_webhook));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(map_response_with_state(
            create_security_headers_layer(production),
            apply_security_headers,
        ))
        .layer(create_cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
