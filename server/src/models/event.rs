use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The slice of an event record the coupon and order core reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
