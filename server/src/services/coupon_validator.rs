//! Coupon listing and validation rules.

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::coupon::normalize_code;
use crate::models::money::check_amount;
use crate::models::{Coupon, Event, NewCoupon, UsageLimit, User, UserType};
use crate::store::Stores;
use crate::utils::error::{AppError, AppResult};

/// Prior-order lookup a usage limit requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCheck {
    Skip,
    /// Any successful order with the coupon blocks reuse.
    Ever,
    /// Successful orders created at or after the instant block reuse.
    Since(DateTime<Utc>),
}

impl UsageCheck {
    pub fn for_limit(limit: UsageLimit, now: DateTime<Utc>) -> Self {
        match limit {
            UsageLimit::Unlimited => UsageCheck::Skip,
            UsageLimit::OncePerUser => UsageCheck::Ever,
            UsageLimit::OncePerMonth => UsageCheck::Since(one_calendar_month_before(now)),
        }
    }
}

/// Same day-of-month one month back, clamped to the last day of a shorter
/// month (31 March goes back to 28/29 February).
pub fn one_calendar_month_before(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(1))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Rules that need no prior-order lookup, in the order their rejection is
/// reported: window, minimum, event, category, new user.
///
/// Event and category lists are each enforced when non-empty. This is
/// stricter than `Coupon::is_listed_for`, which accepts a match on either.
pub fn check_coupon(
    coupon: &Coupon,
    subtotal: Decimal,
    event: &Event,
    buyer: &User,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !coupon.is_within_window(now) {
        return Err(AppError::Expired(
            "Coupon has expired or is not yet valid".to_string(),
        ));
    }

    if subtotal < coupon.min_purchase {
        return Err(AppError::BelowMinimum(format!(
            "Minimum purchase of {} required",
            coupon.min_purchase
        )));
    }

    if !coupon.applicable_events.is_empty() && !coupon.applicable_events.contains(&event.id) {
        return Err(AppError::NotApplicableToEvent(
            "Coupon is not applicable for this event".to_string(),
        ));
    }

    if !coupon.applicable_categories.is_empty()
        && !coupon.applicable_categories.contains(&event.category_id)
    {
        return Err(AppError::NotApplicableToCategory(
            "Coupon is not applicable for this event category".to_string(),
        ));
    }

    if coupon.user_type == UserType::NewUser && !buyer.is_new_user(now) {
        return Err(AppError::NotEligible(
            "Coupon is only valid for new users".to_string(),
        ));
    }

    Ok(())
}

#[derive(Clone)]
pub struct CouponValidator {
    stores: Stores,
}

impl CouponValidator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Coupons a buyer may pick from for an event. An empty result is not an
    /// error.
    pub async fn list_available(
        &self,
        event_id: Option<Uuid>,
        category_id: Option<Uuid>,
    ) -> AppResult<Vec<Coupon>> {
        let (Some(event_id), Some(category_id)) = (event_id, category_id) else {
            return Err(AppError::ValidationError(
                "Event ID and category ID are required".to_string(),
            ));
        };

        let now = Utc::now();
        let coupons: Vec<Coupon> = self
            .stores
            .coupons
            .list_active(now)
            .await?
            .into_iter()
            .filter(|c| c.is_listed_for(event_id, category_id, now))
            .collect();

        debug!(%event_id, %category_id, count = coupons.len(), "Listed available coupons");
        Ok(coupons)
    }

    /// Checks whether `code` applies to the purchase and returns the coupon.
    /// The caller derives the discount with `Coupon::discount_for`.
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
        event_id: Uuid,
        buyer_external_id: &str,
    ) -> AppResult<Coupon> {
        if subtotal.is_sign_negative() {
            return Err(AppError::ValidationError(
                "Subtotal must not be negative".to_string(),
            ));
        }

        let code = normalize_code(code);
        let coupon = self
            .stores
            .coupons
            .find_active_by_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid coupon code".to_string()))?;

        let event = self
            .stores
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let buyer = self
            .stores
            .buyers
            .find_by_external_id(buyer_external_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.check_eligibility(&coupon, subtotal, &event, &buyer).await?;

        info!(code = %coupon.code, buyer_id = %buyer.id, %event_id, "Coupon validated");
        Ok(coupon)
    }

    /// Re-checks a coupon chosen earlier, by id, when the order is placed.
    /// Inactive coupons are treated as missing, as in [`Self::validate`].
    pub async fn validate_for_checkout(
        &self,
        coupon_id: Uuid,
        subtotal: Decimal,
        event: &Event,
        buyer: &User,
    ) -> AppResult<Coupon> {
        let coupon = self
            .stores
            .coupons
            .find_by_id(coupon_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

        self.check_eligibility(&coupon, subtotal, event, buyer).await?;
        Ok(coupon)
    }

    async fn check_eligibility(
        &self,
        coupon: &Coupon,
        subtotal: Decimal,
        event: &Event,
        buyer: &User,
    ) -> AppResult<()> {
        let now = Utc::now();
        check_coupon(coupon, subtotal, event, buyer, now)?;
        self.check_usage(coupon, buyer, now).await
    }

    async fn check_usage(
        &self,
        coupon: &Coupon,
        buyer: &User,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let since = match UsageCheck::for_limit(coupon.usage_limit, now) {
            UsageCheck::Skip => return Ok(()),
            UsageCheck::Ever => None,
            UsageCheck::Since(since) => Some(since),
        };

        let used = self
            .stores
            .orders
            .count_successful_with_coupon(buyer.id, coupon.id, since)
            .await?;

        if used == 0 {
            return Ok(());
        }

        let message = match coupon.usage_limit {
            UsageLimit::OncePerMonth => "Coupon can only be used once per month",
            _ => "Coupon has already been used",
        };
        Err(AppError::NotEligible(message.to_string()))
    }

    pub async fn create_coupon(&self, new_coupon: NewCoupon) -> AppResult<Coupon> {
        if normalize_code(&new_coupon.code).is_empty() {
            return Err(AppError::ValidationError("Coupon code is required".to_string()));
        }
        if new_coupon.valid_from > new_coupon.valid_to {
            return Err(AppError::ValidationError(
                "valid_from must not be after valid_to".to_string(),
            ));
        }
        check_amount("discount_value", new_coupon.discount_value)?;
        check_amount("min_purchase", new_coupon.min_purchase)?;

        let coupon = new_coupon.into_coupon(Utc::now());
        self.stores.coupons.insert(&coupon).await?;

        info!(code = %coupon.code, coupon_id = %coupon.id, "Coupon created");
        Ok(coupon)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::{
        DiscountKind, GatewayRef, Order, OrderStatus, PaymentDetails, TicketLine, TierName,
    };
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        validator: CouponValidator,
        event: Event,
        buyer: User,
    }

    fn welcome10() -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: "WELCOME10".to_string(),
            discount_value: Decimal::from(10),
            discount_kind: DiscountKind::Percentage,
            min_purchase: Decimal::ZERO,
            valid_from: now - Duration::days(10),
            valid_to: now + Duration::days(10),
            is_active: true,
            applicable_events: Vec::new(),
            applicable_categories: Vec::new(),
            usage_limit: UsageLimit::Unlimited,
            user_type: UserType::All,
            created_at: now - Duration::days(10),
        }
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let event = Event {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            title: "Indie Night".to_string(),
            date: Utc::now() + Duration::days(30),
            created_at: Utc::now(),
        };
        let buyer = User {
            id: Uuid::new_v4(),
            external_id: "user_2abc".to_string(),
            name: "Ravi".to_string(),
            email: "ravi@example.com".to_string(),
            created_at: Utc::now() - Duration::days(90),
        };
        store.put_event(event.clone()).await;
        store.put_buyer(buyer.clone()).await;

        Fixture {
            validator: CouponValidator::new(Stores::memory(store.clone())),
            store,
            event,
            buyer,
        }
    }

    fn order_with(coupon: &Coupon, buyer: &User, status: OrderStatus, age: Duration) -> Order {
        let created = Utc::now() - age;
        Order {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            buyer_id: buyer.id,
            coupon_id: Some(coupon.id),
            tickets: vec![TicketLine {
                tier_name: TierName::General,
                quantity: 1,
                price_per_ticket: Decimal::from(100),
            }],
            payment_details: PaymentDetails {
                subtotal: Decimal::from(100),
                processing_fee: Decimal::from(2),
                discount_amount: Decimal::from(10),
                total_amount: Decimal::from(92),
            },
            status,
            gateway_ref: GatewayRef {
                order_id: format!("order_{}", Uuid::new_v4().simple()),
                payment_id: None,
                signature: None,
            },
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn test_welcome_coupon_gives_ten_percent() {
        let f = fixture().await;
        f.store.put_coupon(welcome10()).await;

        let coupon = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap();
        assert_eq!(coupon.discount_for(Decimal::from(500)), Decimal::from(50));
    }

    #[tokio::test]
    async fn test_lowercase_code_matches() {
        let f = fixture().await;
        f.store.put_coupon(welcome10()).await;

        let upper = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap();
        let lower = f
            .validator
            .validate("welcome10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap();
        assert_eq!(upper, lower);
    }

    #[tokio::test]
    async fn test_expired_coupon_rejected() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.valid_to = Utc::now() - Duration::days(1);
        f.store.put_coupon(coupon).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
    }

    #[tokio::test]
    async fn test_unknown_code_and_inactive_coupon_not_found() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.is_active = false;
        f.store.put_coupon(coupon).await;

        for code in ["NOPE", "WELCOME10"] {
            let err = f
                .validator
                .validate(code, Decimal::from(500), f.event.id, &f.buyer.external_id)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_missing_event_not_found() {
        let f = fixture().await;
        f.store.put_coupon(welcome10()).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), Uuid::new_v4(), &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "Event not found"));
    }

    #[tokio::test]
    async fn test_rule_order_reports_window_before_minimum() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.valid_to = Utc::now() - Duration::hours(1);
        coupon.min_purchase = Decimal::from(1000);
        f.store.put_coupon(coupon).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(10), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
    }

    #[tokio::test]
    async fn test_minimum_purchase() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.min_purchase = Decimal::from(300);
        f.store.put_coupon(coupon).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(299), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BelowMinimum(_)));

        f.validator
            .validate("WELCOME10", Decimal::from(300), f.event.id, &f.buyer.external_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_event_and_category_enforced_independently() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.applicable_events = vec![f.event.id];
        coupon.applicable_categories = vec![Uuid::new_v4()];
        f.store.put_coupon(coupon.clone()).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotApplicableToCategory(_)));

        // The same coupon still shows up in the listing for this event.
        let listed = f
            .validator
            .list_available(Some(f.event.id), Some(f.event.category_id))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_event_restriction() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.applicable_events = vec![Uuid::new_v4()];
        f.store.put_coupon(coupon).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotApplicableToEvent(_)));
    }

    #[tokio::test]
    async fn test_new_user_only() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.user_type = UserType::NewUser;
        f.store.put_coupon(coupon).await;

        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotEligible(_)));

        let fresh = User {
            id: Uuid::new_v4(),
            external_id: "user_fresh".to_string(),
            name: "Mei".to_string(),
            email: "mei@example.com".to_string(),
            created_at: Utc::now() - Duration::days(1),
        };
        f.store.put_buyer(fresh).await;
        f.validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, "user_fresh")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_once_per_user_blocks_only_after_success() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.usage_limit = UsageLimit::OncePerUser;
        f.store.put_coupon(coupon.clone()).await;

        for status in [OrderStatus::Pending, OrderStatus::Failed] {
            f.store
                .put_order(order_with(&coupon, &f.buyer, status, Duration::days(1)))
                .await;
        }
        f.validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap();

        f.store
            .put_order(order_with(&coupon, &f.buyer, OrderStatus::Successful, Duration::days(400)))
            .await;
        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_once_per_month_window() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.usage_limit = UsageLimit::OncePerMonth;
        f.store.put_coupon(coupon.clone()).await;

        f.store
            .put_order(order_with(&coupon, &f.buyer, OrderStatus::Successful, Duration::days(45)))
            .await;
        f.validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap();

        f.store
            .put_order(order_with(&coupon, &f.buyer, OrderStatus::Successful, Duration::days(3)))
            .await;
        let err = f
            .validator
            .validate("WELCOME10", Decimal::from(500), f.event.id, &f.buyer.external_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotEligible(msg) if msg.contains("once per month")));
    }

    #[test]
    fn test_calendar_month_subtraction() {
        let march_15 = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            one_calendar_month_before(march_15),
            Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap()
        );

        let march_31 = Utc.with_ymd_and_hms(2023, 3, 31, 8, 0, 0).unwrap();
        assert_eq!(
            one_calendar_month_before(march_31),
            Utc.with_ymd_and_hms(2023, 2, 28, 8, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_list_available_requires_both_ids() {
        let f = fixture().await;
        let err = f
            .validator
            .list_available(Some(f.event.id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_list_available_is_a_pure_filter() {
        let f = fixture().await;
        f.store.put_coupon(welcome10()).await;

        let mut scoped = welcome10();
        scoped.id = Uuid::new_v4();
        scoped.code = "ROCK50".to_string();
        scoped.applicable_categories = vec![Uuid::new_v4()];
        f.store.put_coupon(scoped).await;

        let first = f
            .validator
            .list_available(Some(f.event.id), Some(f.event.category_id))
            .await
            .unwrap();
        let second = f
            .validator
            .list_available(Some(f.event.id), Some(f.event.category_id))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].code, "WELCOME10");
    }

    #[tokio::test]
    async fn test_list_available_excludes_coupons_outside_window() {
        let f = fixture().await;

        let mut expired = welcome10();
        expired.code = "LASTYEAR".to_string();
        expired.valid_from = Utc::now() - Duration::days(400);
        expired.valid_to = Utc::now() - Duration::days(1);
        f.store.put_coupon(expired).await;

        let mut upcoming = welcome10();
        upcoming.id = Uuid::new_v4();
        upcoming.code = "NEXTWEEK".to_string();
        upcoming.valid_from = Utc::now() + Duration::days(7);
        upcoming.valid_to = Utc::now() + Duration::days(30);
        upcoming.applicable_events = vec![f.event.id];
        f.store.put_coupon(upcoming).await;

        let listed = f
            .validator
            .list_available(Some(f.event.id), Some(f.event.category_id))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_validate_for_checkout_applies_usage_limit() {
        let f = fixture().await;
        let mut coupon = welcome10();
        coupon.usage_limit = UsageLimit::OncePerUser;
        f.store.put_coupon(coupon.clone()).await;

        let found = f
            .validator
            .validate_for_checkout(coupon.id, Decimal::from(500), &f.event, &f.buyer)
            .await
            .unwrap();
        assert_eq!(found.id, coupon.id);

        f.store
            .put_order(order_with(&coupon, &f.buyer, OrderStatus::Successful, Duration::days(2)))
            .await;
        let err = f
            .validator
            .validate_for_checkout(coupon.id, Decimal::from(500), &f.event, &f.buyer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotEligible(_)));

        let err = f
            .validator
            .validate_for_checkout(Uuid::new_v4(), Decimal::from(500), &f.event, &f.buyer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "Coupon not found"));
    }

    #[tokio::test]
    async fn test_create_coupon_rejects_unstorable_amounts() {
        let f = fixture().await;
        let payload = NewCoupon {
            code: "PRECISE".to_string(),
            discount_value: Decimal::new(10005, 3),
            discount_kind: DiscountKind::Fixed,
            min_purchase: Decimal::ZERO,
            valid_from: Utc::now(),
            valid_to: Utc::now() + Duration::days(30),
            is_active: true,
            applicable_events: Vec::new(),
            applicable_categories: Vec::new(),
            usage_limit: UsageLimit::Unlimited,
            user_type: UserType::All,
        };
        let err = f.validator.create_coupon(payload.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = f
            .validator
            .create_coupon(NewCoupon {
                discount_value: Decimal::from(10),
                min_purchase: Decimal::from(10_000_000_000_i64),
                ..payload
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_coupon_uppercases_and_rejects_duplicates() {
        let f = fixture().await;
        let payload = || NewCoupon {
            code: "summer25".to_string(),
            discount_value: Decimal::from(25),
            discount_kind: DiscountKind::Percentage,
            min_purchase: Decimal::ZERO,
            valid_from: Utc::now(),
            valid_to: Utc::now() + Duration::days(30),
            is_active: true,
            applicable_events: Vec::new(),
            applicable_categories: Vec::new(),
            usage_limit: UsageLimit::Unlimited,
            user_type: UserType::All,
        };

        let created = f.validator.create_coupon(payload()).await.unwrap();
        assert_eq!(created.code, "SUMMER25");

        let err = f.validator.create_coupon(payload()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
