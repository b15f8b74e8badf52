use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BuyerStore, CouponStore, EventStore, OrderStore, PaymentUpdate};
use crate::models::{Coupon, Event, Order, OrderStatus, User};
use crate::utils::error::{AppError, AppResult};

/// In-process store used by tests and local runs without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    coupons: RwLock<HashMap<Uuid, Coupon>>,
    events: RwLock<HashMap<Uuid, Event>>,
    buyers: RwLock<HashMap<String, User>>,
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_event(&self, event: Event) {
        self.events.write().await.insert(event.id, event);
    }

    pub async fn put_buyer(&self, buyer: User) {
        self.buyers
            .write()
            .await
            .insert(buyer.external_id.clone(), buyer);
    }

    /// Inserts or replaces a coupon without the uniqueness check.
    pub async fn put_coupon(&self, coupon: Coupon) {
        self.coupons.write().await.insert(coupon.id, coupon);
    }

    pub async fn put_order(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn find_active_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
        let coupons = self.coupons.read().await;
        Ok(coupons
            .values()
            .find(|c| c.is_active && c.code == code)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Coupon>> {
        Ok(self.coupons.read().await.get(&id).cloned())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<Coupon>> {
        let coupons = self.coupons.read().await;
        let mut active: Vec<Coupon> = coupons
            .values()
            .filter(|c| c.is_active && c.is_within_window(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    async fn insert(&self, coupon: &Coupon) -> AppResult<()> {
        let mut coupons = self.coupons.write().await;
        if coupons.values().any(|c| c.code == coupon.code) {
            return Err(AppError::Conflict(format!(
                "Coupon code '{}' already exists",
                coupon.code
            )));
        }
        coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.events.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl BuyerStore for MemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        Ok(self.buyers.read().await.get(external_id).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> AppResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .find(|o| o.gateway_ref.order_id == gateway_order_id)
            .cloned())
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn count_successful_with_coupon(
        &self,
        buyer_id: Uuid,
        coupon_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let orders = self.orders.read().await;
        let count = orders
            .values()
            .filter(|o| {
                o.buyer_id == buyer_id
                    && o.coupon_id == Some(coupon_id)
                    && o.status == OrderStatus::Successful
                    && since.map_or(true, |since| o.created_at >= since)
            })
            .count();
        Ok(count as u64)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        payment: PaymentUpdate,
    ) -> AppResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(None);
        };

        order.status = status;
        if let Some(payment_id) = payment.payment_id {
            order.gateway_ref.payment_id = Some(payment_id);
        }
        if let Some(signature) = payment.signature {
            order.gateway_ref.signature = Some(signature);
        }
        order.updated_at = Utc::now();

        Ok(Some(order.clone()))
    }
}
