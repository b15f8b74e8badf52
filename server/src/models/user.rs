use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Accounts younger than this count as new users for coupon eligibility.
pub const NEW_USER_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Subject identifier issued by the identity provider.
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_new_user(&self, now: DateTime<Utc>) -> bool {
        self.created_at >= now - Duration::days(NEW_USER_WINDOW_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_created(at: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            external_id: "user_1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            created_at: at,
        }
    }

    #[test]
    fn test_new_user_window() {
        let now = Utc::now();
        assert!(user_created(now - Duration::days(2)).is_new_user(now));
        assert!(user_created(now - Duration::days(7)).is_new_user(now));
        assert!(!user_created(now - Duration::days(8)).is_new_user(now));
    }
}
