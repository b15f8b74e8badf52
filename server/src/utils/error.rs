use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Coupon expired: {0}")]
    Expired(String),

    #[error("Below minimum purchase: {0}")]
    BelowMinimum(String),

    #[error("Coupon not applicable to event: {0}")]
    NotApplicableToEvent(String),

    #[error("Coupon not applicable to category: {0}")]
    NotApplicableToCategory(String),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Expired(_)
            | AppError::BelowMinimum(_)
            | AppError::NotApplicableToEvent(_)
            | AppError::NotApplicableToCategory(_) => StatusCode::BAD_REQUEST,
            AppError::NotEligible(_) => StatusCode::FORBIDDEN,
            AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Expired(_) => "COUPON_EXPIRED",
            AppError::BelowMinimum(_) => "BELOW_MINIMUM_PURCHASE",
            AppError::NotApplicableToEvent(_) => "NOT_APPLICABLE_TO_EVENT",
            AppError::NotApplicableToCategory(_) => "NOT_APPLICABLE_TO_CATEGORY",
            AppError::NotEligible(_) => "NOT_ELIGIBLE",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::GatewayUnavailable(msg) => {
                error!(code = self.code(), message = %msg, "Application error");
            }
            _ => {
                warn!(code = self.code(), error = %self, "Request rejected");
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Expired(msg)
            | AppError::BelowMinimum(msg)
            | AppError::NotApplicableToEvent(msg)
            | AppError::NotApplicableToCategory(msg)
            | AppError::NotEligible(msg) => msg.clone(),
            AppError::InvalidSignature => "Payment could not be verified".to_string(),
            AppError::GatewayUnavailable(_) => {
                "Payment service is currently unavailable".to_string()
            }
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        error_response(code, self.public_message(), None, status)
    }
}
