//! Wallet and ledger models
//!
//! A wallet holds one prepaid balance per user. Balances only move through
//! ledger rows, each keyed by a unique idempotency key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Prepaid balance of one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: Uuid,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    pub fn new(user_id: Uuid, balance: Decimal) -> Self {
        Self {
            user_id,
            balance,
            currency: "EUR".to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Check if the balance covers `amount`
    pub fn covers(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Ledger row type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    /// Shipment charge
    Charge,
    /// Paid post-delivery exception action
    GiacenzaAction,
    /// Charge settled after the fact (postpaid adjustment)
    PostpaidCharge,
    /// Balance recharge
    TopUp,
    /// Money returned to the customer
    Refund,
    /// Manual adjustment
    Adjustment,
}

impl fmt::Display for WalletTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletTransactionType::Charge => write!(f, "charge"),
            WalletTransactionType::GiacenzaAction => write!(f, "giacenza_action"),
            WalletTransactionType::PostpaidCharge => write!(f, "postpaid_charge"),
            WalletTransactionType::TopUp => write!(f, "top_up"),
            WalletTransactionType::Refund => write!(f, "refund"),
            WalletTransactionType::Adjustment => write!(f, "adjustment"),
        }
    }
}

impl WalletTransactionType {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "charge" => Some(WalletTransactionType::Charge),
            "giacenza_action" => Some(WalletTransactionType::GiacenzaAction),
            "postpaid_charge" => Some(WalletTransactionType::PostpaidCharge),
            "top_up" | "topup" => Some(WalletTransactionType::TopUp),
            "refund" => Some(WalletTransactionType::Refund),
            "adjustment" => Some(WalletTransactionType::Adjustment),
            _ => None,
        }
    }
}

/// Immutable ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Signed amount: negative for debits
    pub amount: Decimal,

    /// Balance right after this row was applied
    pub balance_after: Decimal,

    pub transaction_type: WalletTransactionType,

    /// Unique across the ledger
    pub idempotency_key: String,

    /// Shipment or hold that caused the movement
    pub reference_id: Option<String>,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

/// Caller-supplied context of a ledger movement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerMetadata {
    pub reference_id: Option<String>,
    pub description: Option<String>,
    /// Extra context kept alongside the row
    #[serde(default)]
    pub extra: Option<Value>,
}

impl LedgerMetadata {
    pub fn reference(reference_id: impl Into<String>) -> Self {
        Self {
            reference_id: Some(reference_id.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input of the atomic store primitive
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub user_id: Uuid,
    /// Signed amount; the store refuses it if the balance would go negative
    pub amount: Decimal,
    pub transaction_type: WalletTransactionType,
    pub idempotency_key: String,
    pub metadata: LedgerMetadata,
}

/// Outcome of the atomic store primitive
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerApplyOutcome {
    /// Row inserted and balance moved
    Applied(WalletTransaction),
    /// A row with this idempotency key already existed; nothing changed
    Replayed(WalletTransaction),
    /// The movement would make the balance negative; nothing changed
    Insufficient { available: Decimal },
}

/// Result of a debit or credit as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletMovement {
    pub transaction_id: Uuid,
    pub new_balance: Decimal,
    /// True when the key had already been applied by an earlier call
    pub replayed: bool,
}

impl WalletMovement {
    pub fn from_transaction(tx: &WalletTransaction, replayed: bool) -> Self {
        Self {
            transaction_id: tx.id,
            new_balance: tx.balance_after,
            replayed,
        }
    }
}

/// Advisory credit pre-check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditCheck {
    pub sufficient: bool,
    pub current_balance: Decimal,
    pub required: Decimal,
    /// `required - current_balance` when insufficient, else zero
    pub shortfall: Decimal,
}

impl CreditCheck {
    pub fn new(current_balance: Decimal, required: Decimal) -> Self {
        let sufficient = current_balance >= required;
        Self {
            sufficient,
            current_balance,
            required,
            shortfall: if sufficient {
                Decimal::ZERO
            } else {
                required - current_balance
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_check() {
        let check = CreditCheck::new(dec!(10.00), dec!(6.10));
        assert!(check.sufficient);
        assert_eq!(check.shortfall, dec!(0));

        let check = CreditCheck::new(dec!(2.00), dec!(6.10));
        assert!(!check.sufficient);
        assert_eq!(check.shortfall, dec!(4.10));

        let check = CreditCheck::new(dec!(6.10), dec!(6.10));
        assert!(check.sufficient);
    }

    #[test]
    fn test_transaction_type_round_trip_names() {
        for t in [
            WalletTransactionType::Charge,
            WalletTransactionType::GiacenzaAction,
            WalletTransactionType::PostpaidCharge,
            WalletTransactionType::TopUp,
            WalletTransactionType::Refund,
            WalletTransactionType::Adjustment,
        ] {
            assert_eq!(WalletTransactionType::from_str(&t.to_string()), Some(t));
        }
    }

    #[test]
    fn test_wallet_covers() {
        let wallet = WalletAccount::new(Uuid::new_v4(), dec!(5.00));
        assert!(wallet.covers(dec!(5.00)));
        assert!(!wallet.covers(dec!(5.01)));
    }
}
