//! Wallet DTOs
//!
//! Request and response types for wallet endpoints.

use carrio_core::models::{LedgerMetadata, WalletAccount};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Credit pre-check query
#[derive(Debug, Clone, Deserialize)]
pub struct CreditCheckQuery {
    pub amount: Decimal,
}

/// Debit or credit request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovementRequest {
    /// Amount to move (must be positive, validated by the ledger)
    pub amount: Decimal,

    /// Caller-chosen key; repeating it replays the first result
    #[validate(length(min = 1, max = 255, message = "idempotency_key is required"))]
    pub idempotency_key: String,

    /// Shipment, hold or payment reference
    #[validate(length(max = 255))]
    pub reference_id: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl MovementRequest {
    /// Ledger metadata carried by the movement
    pub fn metadata(&self) -> LedgerMetadata {
        LedgerMetadata {
            reference_id: self.reference_id.clone(),
            description: self.description.clone(),
            extra: None,
        }
    }
}

/// Wallet response
#[derive(Debug, Clone, Serialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub balance: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl From<WalletAccount> for WalletResponse {
    fn from(wallet: WalletAccount) -> Self {
        Self {
            user_id: wallet.user_id.to_string(),
            balance: wallet.balance,
            currency: wallet.currency,
            updated_at: wallet.updated_at,
        }
    }
}
