//! Checkout orders: creation against the payment gateway and the
//! pending -> successful/failed transitions driven by client verification,
//! gateway webhooks, or an explicit failure report.
//!
//! Writes are unguarded single-record updates. A transition outside
//! `OrderStatus::can_transition` is still written but logged, so a retry
//! with identical inputs is always safe and conflicting writes resolve
//! last-write-wins.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::coupon_validator::CouponValidator;
use crate::config::PaymentConfig;
use crate::models::money::{check_amount, round_money};
use crate::models::order::subtotal_of;
use crate::models::{Coupon, GatewayRef, Order, OrderStatus, PaymentDetails, TicketLine};
use crate::payment::signature::{payment_signature, signatures_match, webhook_signature};
use crate::payment::webhook::{WebhookEnvelope, ORDER_PAID};
use crate::payment::{GatewayOrder, PaymentGateway};
use crate::store::{PaymentUpdate, Stores};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    /// Identity-provider subject of the buyer.
    pub buyer_id: String,
    pub event_id: Uuid,
    pub tickets: Vec<TicketLine>,
    pub payment_details: PaymentDetails,
    #[serde(default)]
    pub coupon_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    /// Public key the client-side payment widget needs.
    pub key_id: String,
    pub gateway_order: GatewayOrder,
    pub order: Order,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPayment {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub buyer_id: String,
    pub event_id: Uuid,
    pub tickets: Vec<TicketLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub payment_details: PaymentDetails,
    pub coupon: Option<Coupon>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Paid { order_id: Uuid },
    UnknownOrder { gateway_order_id: String },
    Ignored { event: String },
}

fn out_of_range() -> AppError {
    AppError::ValidationError("Order amount is out of range".to_string())
}

/// Ticket lines must be non-empty, with positive quantities and storable
/// prices. Returns their subtotal.
pub fn validate_ticket_lines(tickets: &[TicketLine]) -> AppResult<Decimal> {
    if tickets.is_empty() {
        return Err(AppError::ValidationError(
            "At least one ticket is required".to_string(),
        ));
    }
    for line in tickets {
        if line.quantity == 0 {
            return Err(AppError::ValidationError(format!(
                "Quantity for tier {} must be positive",
                line.tier_name
            )));
        }
        check_amount("price_per_ticket", line.price_per_ticket)?;
    }

    let subtotal = subtotal_of(tickets).ok_or_else(out_of_range)?;
    check_amount("subtotal", subtotal)?;
    Ok(subtotal)
}

/// Fee is charged on the subtotal; the discount is then taken off.
pub fn price_tickets(
    tickets: &[TicketLine],
    fee_percent: Decimal,
    coupon: Option<&Coupon>,
) -> AppResult<PaymentDetails> {
    let subtotal = validate_ticket_lines(tickets)?;
    let processing_fee = subtotal
        .checked_mul(fee_percent)
        .map(|fee| round_money(fee / Decimal::ONE_HUNDRED))
        .ok_or_else(out_of_range)?;
    let discount_amount = coupon
        .map(|c| round_money(c.discount_for(subtotal)))
        .unwrap_or(Decimal::ZERO);
    let total_amount = subtotal
        .checked_add(processing_fee)
        .and_then(|t| t.checked_sub(discount_amount))
        .ok_or_else(out_of_range)?;

    check_amount("processing_fee", processing_fee)?;
    check_amount("total_amount", total_amount)?;

    Ok(PaymentDetails {
        subtotal,
        processing_fee,
        discount_amount,
        total_amount,
    })
}

/// Client-submitted amounts must equal the ones derived server-side.
pub fn ensure_amounts_match(submitted: &PaymentDetails, derived: &PaymentDetails) -> AppResult<()> {
    let fields = [
        ("subtotal", submitted.subtotal, derived.subtotal),
        ("processing_fee", submitted.processing_fee, derived.processing_fee),
        ("discount_amount", submitted.discount_amount, derived.discount_amount),
        ("total_amount", submitted.total_amount, derived.total_amount),
    ];
    for (field, submitted, derived) in fields {
        check_amount(field, submitted)?;
        if submitted != derived {
            return Err(AppError::ValidationError(format!(
                "{field} does not match the computed amount of {derived}"
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct OrderLifecycle {
    stores: Stores,
    gateway: Arc<dyn PaymentGateway>,
    coupons: CouponValidator,
    config: PaymentConfig,
}

impl OrderLifecycle {
    pub fn new(stores: Stores, gateway: Arc<dyn PaymentGateway>, config: PaymentConfig) -> Self {
        Self {
            coupons: CouponValidator::new(stores.clone()),
            stores,
            gateway,
            config,
        }
    }

    pub async fn quote(&self, request: QuoteRequest) -> AppResult<Quote> {
        let subtotal = validate_ticket_lines(&request.tickets)?;
        let coupon = match request.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(
                self.coupons
                    .validate(code, subtotal, request.event_id, &request.buyer_id)
                    .await?,
            ),
            _ => {
                if self.stores.events.find_by_id(request.event_id).await?.is_none() {
                    return Err(AppError::NotFound("Event not found".to_string()));
                }
                None
            }
        };

        let payment_details = price_tickets(
            &request.tickets,
            self.config.processing_fee_percent,
            coupon.as_ref(),
        )?;
        Ok(Quote {
            payment_details,
            coupon,
        })
    }

    /// Re-derives the amounts from the ticket lines, the configured fee and
    /// the re-validated coupon, and rejects a request whose submitted amounts
    /// differ. Then creates the gateway order and persists a pending order
    /// bound to it. Nothing is persisted if the gateway call fails.
    pub async fn create_order(&self, request: CreateOrder) -> AppResult<Checkout> {
        let subtotal = validate_ticket_lines(&request.tickets)?;

        let buyer = self
            .stores
            .buyers
            .find_by_external_id(&request.buyer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let event = self
            .stores
            .events
            .find_by_id(request.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let coupon = match request.coupon_id {
            Some(coupon_id) => Some(
                self.coupons
                    .validate_for_checkout(coupon_id, subtotal, &event, &buyer)
                    .await?,
            ),
            None => None,
        };

        let payment_details = price_tickets(
            &request.tickets,
            self.config.processing_fee_percent,
            coupon.as_ref(),
        )?;
        ensure_amounts_match(&request.payment_details, &payment_details)?;
        if payment_details.total_amount <= Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Total amount must be positive".to_string(),
            ));
        }

        let amount_minor = payment_details
            .total_minor_units()
            .ok_or_else(out_of_range)?;

        let order_id = Uuid::new_v4();
        let receipt = format!("rcpt_{}", order_id.simple());
        let gateway_order = self
            .gateway
            .create_order(amount_minor, &self.config.currency, &receipt)
            .await?;

        let now = Utc::now();
        let order = Order {
            id: order_id,
            event_id: request.event_id,
            buyer_id: buyer.id,
            coupon_id: request.coupon_id,
            tickets: request.tickets,
            payment_details,
            status: OrderStatus::Pending,
            gateway_ref: GatewayRef {
                order_id: gateway_order.id.clone(),
                payment_id: None,
                signature: None,
            },
            created_at: now,
            updated_at: now,
        };
        self.stores.orders.insert(&order).await?;

        info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order.id,
            amount_minor,
            "Order created"
        );

        Ok(Checkout {
            key_id: self.config.key_id.clone(),
            gateway_order,
            order,
        })
    }

    /// Checks the client-submitted checkout signature. A mismatch is a
    /// terminal outcome: the order is marked failed and returned, not an
    /// error.
    pub async fn verify_payment(&self, request: VerifyPayment) -> AppResult<Order> {
        let order = self
            .stores
            .orders
            .find_by_id(request.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.gateway_ref.order_id != request.gateway_order_id {
            warn!(
                order_id = %order.id,
                stored = %order.gateway_ref.order_id,
                submitted = %request.gateway_order_id,
                "Verification submitted for a different gateway order"
            );
        }

        let expected = payment_signature(
            &self.config.key_secret,
            &request.gateway_order_id,
            &request.gateway_payment_id,
        );

        if signatures_match(&expected, &request.signature) {
            let updated = self
                .transition(
                    &order,
                    OrderStatus::Successful,
                    PaymentUpdate {
                        payment_id: Some(request.gateway_payment_id),
                        signature: Some(request.signature),
                    },
                )
                .await?;
            info!(order_id = %updated.id, "Payment verified");
            Ok(updated)
        } else {
            warn!(order_id = %order.id, "Payment signature mismatch");
            self.transition(&order, OrderStatus::Failed, PaymentUpdate::default())
                .await
        }
    }

    /// Authoritative reconciliation path: resolves the order from the
    /// gateway's own order id. Rejects bodies whose signature does not match
    /// without touching any order.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let expected = webhook_signature(&self.config.webhook_secret, raw_body);
        let valid = signature_header
            .map(|provided| signatures_match(&expected, provided))
            .unwrap_or(false);
        if !valid {
            warn!(
                header_present = signature_header.is_some(),
                "Rejected webhook with invalid signature"
            );
            return Err(AppError::InvalidSignature);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body).map_err(|e| {
            AppError::ValidationError(format!("Malformed webhook payload: {e}"))
        })?;

        if envelope.event != ORDER_PAID {
            info!(event = %envelope.event, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event: envelope.event,
            });
        }

        let gateway_order_id = envelope.gateway_order_id().ok_or_else(|| {
            AppError::ValidationError("order.paid payload has no order id".to_string())
        })?;

        let Some(order) = self
            .stores
            .orders
            .find_by_gateway_order_id(gateway_order_id)
            .await?
        else {
            warn!(%gateway_order_id, "order.paid for unknown gateway order");
            return Ok(WebhookOutcome::UnknownOrder {
                gateway_order_id: gateway_order_id.to_string(),
            });
        };

        let updated = self
            .transition(
                &order,
                OrderStatus::Successful,
                PaymentUpdate {
                    payment_id: envelope.gateway_payment_id().map(str::to_string),
                    signature: None,
                },
            )
            .await?;

        info!(order_id = %updated.id, %gateway_order_id, "Order paid via webhook");
        Ok(WebhookOutcome::Paid {
            order_id: updated.id,
        })
    }

    /// Caller-declared failure; applies regardless of the current status.
    pub async fn mark_failed(&self, order_id: Uuid) -> AppResult<Order> {
        let order = self
            .stores
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        let updated = self
            .transition(&order, OrderStatus::Failed, PaymentUpdate::default())
            .await?;
        info!(order_id = %updated.id, "Order marked failed by client");
        Ok(updated)
    }

    pub async fn orders_for_buyer(&self, buyer_external_id: &str) -> AppResult<Vec<Order>> {
        let buyer = self
            .stores
            .buyers
            .find_by_external_id(buyer_external_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.stores.orders.list_for_buyer(buyer.id).await
    }

    async fn transition(
        &self,
        order: &Order,
        next: OrderStatus,
        payment: PaymentUpdate,
    ) -> AppResult<Order> {
        if !OrderStatus::can_transition(order.status, next) {
            warn!(
                order_id = %order.id,
                from = %order.status,
                to = %next,
                "Overwriting terminal order status"
            );
        }

        self.stores
            .orders
            .set_status(order.id, next, payment)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }
}
