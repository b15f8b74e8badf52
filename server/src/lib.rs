pub mod config;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::payment::PaymentGateway;
use crate::services::{CouponValidator, OrderLifecycle};
use crate::store::Stores;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub coupons: CouponValidator,
    pub orders: OrderLifecycle,
}

impl AppState {
    pub fn new(stores: Stores, gateway: Arc<dyn PaymentGateway>, payment: PaymentConfig) -> Self {
        Self {
            coupons: CouponValidator::new(stores.clone()),
            orders: OrderLifecycle::new(stores, gateway, payment),
        }
    }
}
