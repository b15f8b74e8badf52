use std::env;
use std::net::SocketAddr;

use rust_decimal::Decimal;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ticketing";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_GATEWAY_URL: &str = "https://api.razorpay.com/v1";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_FEE_PERCENT: &str = "2";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Gateway credentials and checkout pricing, handed to the order lifecycle
/// at construction.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub gateway_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub currency: String,
    pub processing_fee_percent: Decimal,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub production: bool,
    pub payment: PaymentConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                value: raw.clone(),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let bind_raw = or_default("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let fee_raw = or_default("PROCESSING_FEE_PERCENT", DEFAULT_FEE_PERCENT);
        let processing_fee_percent: Decimal =
            fee_raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    name: "PROCESSING_FEE_PERCENT",
                    value: fee_raw.clone(),
                })?;
        if processing_fee_percent.is_sign_negative() {
            return Err(ConfigError::Invalid {
                name: "PROCESSING_FEE_PERCENT",
                value: fee_raw,
            });
        }

        let allowed_origins = or_default("CORS_ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let production = lookup("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        Ok(Self {
            database_url: or_default("DATABASE_URL", DEFAULT_DATABASE_URL),
            max_connections,
            bind_addr,
            allowed_origins,
            production,
            payment: PaymentConfig {
                gateway_url: or_default("PAYMENT_GATEWAY_URL", DEFAULT_GATEWAY_URL),
                key_id: required("PAYMENT_KEY_ID")?,
                key_secret: required("PAYMENT_KEY_SECRET")?,
                webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
                currency: or_default("PAYMENT_CURRENCY", DEFAULT_CURRENCY).to_uppercase(),
                processing_fee_percent,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const SECRETS: [(&str, &str); 3] = [
        ("PAYMENT_KEY_ID", "rzp_test_key"),
        ("PAYMENT_KEY_SECRET", "key_secret"),
        ("PAYMENT_WEBHOOK_SECRET", "webhook_secret"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&SECRETS)).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.payment.currency, "INR");
        assert_eq!(config.payment.processing_fee_percent, Decimal::from(2));
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(!config.production);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup_from(&SECRETS[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PAYMENT_WEBHOOK_SECRET")));
    }

    #[test]
    fn test_invalid_fee_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("PROCESSING_FEE_PERCENT", "-1"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { name: "PROCESSING_FEE_PERCENT", .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("PAYMENT_CURRENCY", "usd"),
            ("PROCESSING_FEE_PERCENT", "2.5"),
            ("RUST_ENV", "Production"),
            ("CORS_ALLOWED_ORIGINS", "https://tickets.example.com, ,"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.payment.currency, "USD");
        assert_eq!(config.payment.processing_fee_percent, Decimal::new(25, 1));
        assert!(config.production);
        assert_eq!(config.allowed_origins, vec!["https://tickets.example.com"]);
    }
}
