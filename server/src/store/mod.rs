//! Persistence ports used by the coupon and order services.
//!
//! Every write is a single-record update. Nothing here locks or spans
//! records in a transaction, so concurrent writers resolve last-write-wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Coupon, Event, Order, OrderStatus, User};
use crate::utils::error::AppResult;

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Looks up an active coupon by its (already uppercased) code.
    async fn find_active_by_code(&self, code: &str) -> AppResult<Option<Coupon>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Coupon>>;

    /// Active coupons whose validity window contains `now`.
    async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<Coupon>>;

    /// Fails with `Conflict` when the code is already taken.
    async fn insert(&self, coupon: &Coupon) -> AppResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Event>>;
}

#[async_trait]
pub trait BuyerStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>>;
}

/// Payment fields written alongside a status change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentUpdate {
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> AppResult<()>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> AppResult<Option<Order>>;

    /// Orders for a buyer, newest first.
    async fn list_for_buyer(&self, buyer_id: Uuid) -> AppResult<Vec<Order>>;

    /// Successful orders by `buyer_id` that used `coupon_id`, optionally
    /// restricted to those created at or after `since`.
    async fn count_successful_with_coupon(
        &self,
        buyer_id: Uuid,
        coupon_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64>;

    /// Overwrites status and any provided payment fields. Returns the updated
    /// order, or `None` when no order has that id.
    async fn set_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        payment: PaymentUpdate,
    ) -> AppResult<Option<Order>>;
}

/// Bundle of store handles shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub coupons: Arc<dyn CouponStore>,
    pub events: Arc<dyn EventStore>,
    pub buyers: Arc<dyn BuyerStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            coupons: store.clone(),
            events: store.clone(),
            buyers: store.clone(),
            orders: store,
        }
    }

    pub fn memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            coupons: store.clone(),
            events: store.clone(),
            buyers: store.clone(),
            orders: store,
        }
    }
}
