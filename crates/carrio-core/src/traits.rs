//! Store traits
//!
//! Each component receives an explicitly constructed store handle
//! implementing these traits: the PostgreSQL repositories in production,
//! the in-memory store in tests.

use crate::error::AppError;
use crate::models::{
    Address, HoldActionType, LedgerApplyOutcome, NewWalletTransaction, PlatformProviderCost,
    PriceList, PriceListAssignment, PriceListEntry, PriceListStatus, ShipmentHold,
    StorageSurchargeConfig, UserProfile, WalletAccount, WalletTransaction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

/// Price list repository
#[async_trait]
pub trait PriceListRepository: Send + Sync {
    /// Find price list by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PriceList>, AppError>;

    /// Entries of a list, optionally restricted to one service type
    async fn find_entries(
        &self,
        price_list_id: Uuid,
        service_type: Option<&str>,
    ) -> Result<Vec<PriceListEntry>, AppError>;

    /// Count entries of a list
    async fn count_entries(&self, price_list_id: Uuid) -> Result<i64, AppError>;

    /// Active global/supplier lists serving a courier, by code or name
    async fn find_platform_lists_for_courier(
        &self,
        courier_code: &str,
    ) -> Result<Vec<PriceList>, AppError>;

    /// Replace the metadata blob; callers merge before writing
    async fn update_metadata(&self, id: Uuid, metadata: &Value) -> Result<PriceList, AppError>;

    /// Set the lifecycle status
    async fn update_status(&self, id: Uuid, status: PriceListStatus)
        -> Result<PriceList, AppError>;
}

/// Price list assignment repository
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Non-revoked assignments of a user
    async fn find_active_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PriceListAssignment>, AppError>;
}

/// User profile lookups
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;
}

/// Wallet storage
///
/// `apply_transaction` is the only way a balance changes. Implementations
/// must perform the idempotency check, the non-negative balance check, the
/// balance update and the ledger insert as one atomic unit, and report
/// store-level serialization conflicts as `AppError::TransientConflict`.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Find wallet of a user
    async fn find_wallet(&self, user_id: Uuid) -> Result<Option<WalletAccount>, AppError>;

    /// Atomically apply a signed movement keyed by its idempotency key
    async fn apply_transaction(
        &self,
        tx: &NewWalletTransaction,
    ) -> Result<LedgerApplyOutcome, AppError>;

    /// Find ledger row by idempotency key
    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<WalletTransaction>, AppError>;

    /// Most recent ledger rows of a user
    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, AppError>;
}

/// Confirmation written when a hold action has been paid
#[derive(Debug, Clone)]
pub struct HoldActionConfirmation {
    pub hold_id: Uuid,
    pub action_type: HoldActionType,
    pub action_cost: Decimal,
    pub new_address: Option<Address>,
    pub wallet_transaction_id: Option<Uuid>,
}

/// Shipment hold repository
#[async_trait]
pub trait HoldRepository: Send + Sync {
    /// Find hold by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ShipmentHold>, AppError>;

    /// Storage-surcharge configuration of a courier
    async fn find_storage_config(
        &self,
        courier_code: &str,
    ) -> Result<Option<StorageSurchargeConfig>, AppError>;

    /// Move an open hold to `action_confirmed`, recording cost and payment.
    ///
    /// Conditional on the hold still being open; returns `None` when it is not.
    async fn confirm_action(
        &self,
        confirmation: &HoldActionConfirmation,
    ) -> Result<Option<ShipmentHold>, AppError>;
}

/// Provider cost bookkeeping repository
#[async_trait]
pub trait ProviderCostRepository: Send + Sync {
    /// Recorded provider costs of a courier since a point in time
    async fn find_recent_costs(
        &self,
        courier_code: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Decimal>, AppError>;

    /// Row recorded for a shipment
    async fn find_by_shipment(
        &self,
        shipment_id: Uuid,
    ) -> Result<Option<PlatformProviderCost>, AppError>;

    /// Insert unless the shipment already has a row; returns the stored row
    async fn insert_once(
        &self,
        row: &PlatformProviderCost,
    ) -> Result<PlatformProviderCost, AppError>;
}
