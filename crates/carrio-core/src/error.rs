//! Unified error handling for Carrio
//!
//! Business errors (no rate, insufficient funds, hold not modifiable) are
//! recoverable and carry enough detail to render a precise message.
//! Transient conflicts are the only retryable kind; configuration errors
//! always abort the operation.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Concurrency Errors ====================
    #[error("Transient conflict: {0}")]
    TransientConflict(String),

    #[error("Operation failed after {attempts} attempts, try again: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    // ==================== Business Logic Errors ====================
    #[error("No rate for zone {zone} at {weight} kg ({service_type})")]
    RateNotFound {
        zone: String,
        weight: String,
        service_type: String,
    },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Price list not found: {0}")]
    PriceListNotFound(String),

    #[error("Wallet not found for user: {0}")]
    WalletNotFound(String),

    #[error("Hold not found: {0}")]
    HoldNotFound(String),

    #[error("Hold {id} is not modifiable (status: {status})")]
    HoldNotModifiable { id: String, status: String },

    // ==================== Configuration Errors ====================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config load error: {0}")]
    Config(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) | AppError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }

            // 402 Payment Required
            AppError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,

            // 404 Not Found
            AppError::RateNotFound { .. }
            | AppError::PriceListNotFound(_)
            | AppError::WalletNotFound(_)
            | AppError::HoldNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_)
            | AppError::HoldNotModifiable { .. }
            | AppError::TransientConflict(_) => StatusCode::CONFLICT,

            // 503 Service Unavailable (caller should retry later)
            AppError::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::TransientConflict(_) => "transient_conflict",
            AppError::RetriesExhausted { .. } => "retries_exhausted",
            AppError::RateNotFound { .. } => "rate_not_found",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::PriceListNotFound(_) => "price_list_not_found",
            AppError::WalletNotFound(_) => "wallet_not_found",
            AppError::HoldNotFound(_) => "hold_not_found",
            AppError::HoldNotModifiable { .. } => "hold_not_modifiable",
            AppError::Configuration(_) => "configuration_error",
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::MissingField(_) => "missing_field",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the failed operation may be retried as a whole
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientConflict(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
