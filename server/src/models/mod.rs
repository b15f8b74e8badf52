pub mod coupon;
pub mod event;
pub mod money;
pub mod order;
pub mod user;

pub use coupon::{Coupon, DiscountKind, NewCoupon, UsageLimit, UserType};
pub use event::Event;
pub use order::{GatewayRef, Order, OrderStatus, PaymentDetails, TicketLine, TierName};
pub use user::User;
