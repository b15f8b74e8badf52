use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{BuyerStore, CouponStore, EventStore, OrderStore, PaymentUpdate};
use crate::models::{
    Coupon, Event, GatewayRef, Order, OrderStatus, PaymentDetails, TicketLine, User,
};
use crate::utils::error::{AppError, AppResult};

const COUPON_COLUMNS: &str = "id, code, discount_value, discount_kind, min_purchase, valid_from, \
     valid_to, is_active, applicable_events, applicable_categories, usage_limit, user_type, \
     created_at";

const ORDER_COLUMNS: &str = "id, event_id, buyer_id, coupon_id, tickets, subtotal, processing_fee, \
     discount_amount, total_amount, status, gateway_order_id, gateway_payment_id, \
     gateway_signature, created_at, updated_at";

/// Postgres-backed implementation of every store port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Flat `orders` row; nested into [`Order`] after decoding.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    event_id: Uuid,
    buyer_id: Uuid,
    coupon_id: Option<Uuid>,
    tickets: Json<Vec<TicketLine>>,
    subtotal: Decimal,
    processing_fee: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    status: OrderStatus,
    gateway_order_id: String,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            event_id: row.event_id,
            buyer_id: row.buyer_id,
            coupon_id: row.coupon_id,
            tickets: row.tickets.0,
            payment_details: PaymentDetails {
                subtotal: row.subtotal,
                processing_fee: row.processing_fee,
                discount_amount: row.discount_amount,
                total_amount: row.total_amount,
            },
            status: row.status,
            gateway_ref: GatewayRef {
                order_id: row.gateway_order_id,
                payment_id: row.gateway_payment_id,
                signature: row.gateway_signature,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CouponStore for PgStore {
    async fn find_active_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
        let sql =
            format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 AND is_active = true");
        let coupon = sqlx::query_as::<_, Coupon>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coupon)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1");
        let coupon = sqlx::query_as::<_, Coupon>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coupon)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<Coupon>> {
        let sql = format!(
            "SELECT {COUPON_COLUMNS} FROM coupons
             WHERE is_active = true AND valid_from <= $1 AND valid_to >= $1
             ORDER BY code ASC"
        );
        let coupons = sqlx::query_as::<_, Coupon>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(coupons)
    }

    async fn insert(&self, coupon: &Coupon) -> AppResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO coupons
                   (id, code, discount_value, discount_kind, min_purchase, valid_from, valid_to,
                    is_active, applicable_events, applicable_categories, usage_limit, user_type,
                    created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(coupon.discount_value)
        .bind(coupon.discount_kind)
        .bind(coupon.min_purchase)
        .bind(coupon.valid_from)
        .bind(coupon.valid_to)
        .bind(coupon.is_active)
        .bind(&coupon.applicable_events)
        .bind(&coupon.applicable_categories)
        .bind(coupon.usage_limit)
        .bind(coupon.user_type)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::Conflict(format!("Coupon code '{}' already exists", coupon.code)),
            ),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, category_id, title, date, created_at FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }
}

#[async_trait]
impl BuyerStore for PgStore {
    async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, external_id, name, email, created_at FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO orders
                   (id, event_id, buyer_id, coupon_id, tickets, subtotal, processing_fee,
                    discount_amount, total_amount, status, gateway_order_id, gateway_payment_id,
                    gateway_signature, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(order.id)
        .bind(order.event_id)
        .bind(order.buyer_id)
        .bind(order.coupon_id)
        .bind(Json(&order.tickets))
        .bind(order.payment_details.subtotal)
        .bind(order.payment_details.processing_fee)
        .bind(order.payment_details.discount_amount)
        .bind(order.payment_details.total_amount)
        .bind(order.status)
        .bind(&order.gateway_ref.order_id)
        .bind(&order.gateway_ref.payment_id)
        .bind(&order.gateway_ref.signature)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> AppResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(gateway_order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> AppResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(buyer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn count_successful_with_coupon(
        &self,
        buyer_id: Uuid,
        coupon_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM orders
               WHERE buyer_id = $1
                 AND coupon_id = $2
                 AND status = 'successful'
                 AND ($3::timestamptz IS NULL OR created_at >= $3)"#,
        )
        .bind(buyer_id)
        .bind(coupon_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        payment: PaymentUpdate,
    ) -> AppResult<Option<Order>> {
        let sql = format!(
            "UPDATE orders
             SET status = $2,
                 gateway_payment_id = COALESCE($3, gateway_payment_id),
                 gateway_signature = COALESCE($4, gateway_signature),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(status)
            .bind(payment.payment_id)
            .bind(payment.signature)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }
}
