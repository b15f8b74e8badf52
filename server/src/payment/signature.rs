//! HMAC-SHA256 signatures shared with the payment gateway.
//!
//! Client checkout signatures cover `"{gateway_order_id}|{gateway_payment_id}"`;
//! webhook signatures cover the raw request body. Both are lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub fn sign_hex(secret: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

pub fn payment_signature(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    let payload = format!("{gateway_order_id}|{gateway_payment_id}");
    sign_hex(secret, payload.as_bytes())
}

pub fn webhook_signature(secret: &str, raw_body: &[u8]) -> String {
    sign_hex(secret, raw_body)
}

/// Exact string equality, compared in constant time.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len() && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}
