pub mod coupon_validator;
pub mod order_lifecycle;

pub use coupon_validator::CouponValidator;
pub use order_lifecycle::OrderLifecycle;
