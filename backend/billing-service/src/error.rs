/// Error types for Billing Service
///
/// This module defines all error types that can occur in the billing-service.
/// Errors are converted to appropriate HTTP responses for API clients.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use block_core::{LedgerError, SizeError};
use std::fmt;

/// Result type for billing-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed
    DatabaseError(String),

    /// Content size is non-positive or non-finite
    InvalidSize(String),

    /// Reservation requested without enough available blocks
    InsufficientBlocks { requested: i64, available: i64 },

    /// Actual upload size exceeds the reservation and no extra blocks remain
    ShortfallOnFinalize { reserved: i64, actual: i64 },

    /// Ledger row contention not resolved within the retry budget
    ConcurrentModification(String),

    /// Checkout-session creation at the payment gateway failed
    PaymentGatewayError(String),

    /// Video host collaborator call failed
    VideoHostError(String),

    /// Validation failed
    ValidationError(String),

    /// Resource not found
    NotFound(String),

    /// Internal server error
    Internal(String),

    /// Bad request
    BadRequest(String),

    /// Conflict (invalid state transition, duplicate resource, etc.)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::InvalidSize(msg) => write!(f, "Invalid size: {}", msg),
            AppError::InsufficientBlocks {
                requested,
                available,
            } => write!(
                f,
                "Insufficient blocks: requested {}, available {}",
                requested, available
            ),
            AppError::ShortfallOnFinalize { reserved, actual } => write!(
                f,
                "Finalize shortfall: actual {} blocks exceed reserved {}",
                actual, reserved
            ),
            AppError::ConcurrentModification(msg) => {
                write!(f, "Concurrent modification: {}", msg)
            }
            AppError::PaymentGatewayError(msg) => write!(f, "Payment gateway error: {}", msg),
            AppError::VideoHostError(msg) => write!(f, "Video host error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidSize(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientBlocks { .. } => StatusCode::CONFLICT,
            AppError::ShortfallOnFinalize { .. } => StatusCode::CONFLICT,
            AppError::ConcurrentModification(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            AppError::VideoHostError(_) => StatusCode::BAD_GATEWAY,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        // Admission failures carry enough detail to route the caller into the
        // purchase flow without a second round-trip.
        if let AppError::InsufficientBlocks {
            requested,
            available,
        } = self
        {
            body["missing_blocks"] = serde_json::json!((requested - available).max(0));
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SizeError> for AppError {
    fn from(err: SizeError) -> Self {
        AppError::InvalidSize(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBlocks {
                requested,
                available,
            } => AppError::InsufficientBlocks {
                requested,
                available,
            },
            LedgerError::ShortfallOnFinalize { reserved, actual } => {
                AppError::ShortfallOnFinalize { reserved, actual }
            }
            LedgerError::NegativeBlocks(n) => {
                AppError::Internal(format!("negative block count {} reached the ledger", n))
            }
        }
    }
}
