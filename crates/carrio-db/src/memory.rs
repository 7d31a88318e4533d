//! In-memory store
//!
//! Implements every store trait over a single mutex-guarded state, so each
//! trait call is atomic the same way the PostgreSQL transaction is. Used by
//! service tests and for running the API without a database.
//!
//! Fault injection hooks simulate transient conflicts and store outages.

use carrio_core::{
    models::{
        HoldStatus, LedgerApplyOutcome, NewWalletTransaction, PlatformProviderCost, PriceList,
        PriceListAssignment, PriceListEntry, PriceListStatus, PriceListType, ShipmentHold,
        StorageSurchargeConfig, UserProfile, WalletAccount, WalletTransaction,
    },
    traits::{
        AssignmentRepository, HoldActionConfirmation, HoldRepository, PriceListRepository,
        ProviderCostRepository, UserProfileRepository, WalletStore,
    },
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    price_lists: HashMap<Uuid, PriceList>,
    entries: Vec<PriceListEntry>,
    assignments: Vec<PriceListAssignment>,
    profiles: HashMap<Uuid, UserProfile>,
    wallets: HashMap<Uuid, WalletAccount>,
    transactions: Vec<WalletTransaction>,
    holds: HashMap<Uuid, ShipmentHold>,
    storage_configs: HashMap<String, StorageSurchargeConfig>,
    provider_costs: Vec<PlatformProviderCost>,

    // Fault injection
    pending_conflicts: u32,
    apply_attempts: u32,
    fail_reads: bool,
}

impl MemoryState {
    fn check_reads(&self) -> AppResult<()> {
        if self.fail_reads {
            return Err(AppError::Database("injected store outage".to_string()));
        }
        Ok(())
    }
}

/// Shared in-memory implementation of the store traits
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_price_list(&self, list: PriceList) {
        self.state.lock().price_lists.insert(list.id, list);
    }

    pub fn insert_entries(&self, entries: impl IntoIterator<Item = PriceListEntry>) {
        self.state.lock().entries.extend(entries);
    }

    pub fn insert_assignment(&self, assignment: PriceListAssignment) {
        self.state.lock().assignments.push(assignment);
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.state.lock().profiles.insert(profile.id, profile);
    }

    /// Create or overwrite a wallet with the given balance
    pub fn set_balance(&self, user_id: Uuid, balance: Decimal) {
        self.state
            .lock()
            .wallets
            .insert(user_id, WalletAccount::new(user_id, balance));
    }

    pub fn insert_hold(&self, hold: ShipmentHold) {
        self.state.lock().holds.insert(hold.id, hold);
    }

    pub fn insert_storage_config(&self, config: StorageSurchargeConfig) {
        self.state
            .lock()
            .storage_configs
            .insert(config.courier_code.to_lowercase(), config);
    }

    pub fn insert_provider_cost(&self, row: PlatformProviderCost) {
        self.state.lock().provider_costs.push(row);
    }

    /// Make the next `n` wallet applications fail with a transient conflict
    pub fn fail_next_applies(&self, n: u32) {
        self.state.lock().pending_conflicts = n;
    }

    /// Make every read fail with a database error
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Number of `apply_transaction` calls seen so far
    pub fn apply_attempts(&self) -> u32 {
        self.state.lock().apply_attempts
    }

    /// Ledger rows of a user, oldest first
    pub fn transactions_of(&self, user_id: Uuid) -> Vec<WalletTransaction> {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn hold(&self, id: Uuid) -> Option<ShipmentHold> {
        self.state.lock().holds.get(&id).cloned()
    }

    /// Force a hold out of `open`, as a concurrent confirmation would
    pub fn set_hold_status(&self, id: Uuid, status: HoldStatus) {
        if let Some(hold) = self.state.lock().holds.get_mut(&id) {
            hold.status = status;
            hold.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl PriceListRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PriceList>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state.price_lists.get(&id).cloned())
    }

    async fn find_entries(
        &self,
        price_list_id: Uuid,
        service_type: Option<&str>,
    ) -> AppResult<Vec<PriceListEntry>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.price_list_id == price_list_id)
            .filter(|e| service_type.map_or(true, |s| e.service_type == s))
            .cloned()
            .collect())
    }

    async fn count_entries(&self, price_list_id: Uuid) -> AppResult<i64> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.price_list_id == price_list_id)
            .count() as i64)
    }

    async fn find_platform_lists_for_courier(
        &self,
        courier_code: &str,
    ) -> AppResult<Vec<PriceList>> {
        let state = self.state.lock();
        state.check_reads()?;
        let mut lists: Vec<PriceList> = state
            .price_lists
            .values()
            .filter(|l| l.is_active())
            .filter(|l| matches!(l.list_type, PriceListType::Global | PriceListType::Supplier))
            .filter(|l| l.serves_courier(courier_code))
            .cloned()
            .collect();
        lists.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(lists)
    }

    async fn update_metadata(&self, id: Uuid, metadata: &Value) -> AppResult<PriceList> {
        let mut state = self.state.lock();
        let list = state
            .price_lists
            .get_mut(&id)
            .ok_or_else(|| AppError::PriceListNotFound(id.to_string()))?;
        list.metadata = metadata.clone();
        list.updated_at = Utc::now();
        Ok(list.clone())
    }

    async fn update_status(&self, id: Uuid, status: PriceListStatus) -> AppResult<PriceList> {
        let mut state = self.state.lock();
        let list = state
            .price_lists
            .get_mut(&id)
            .ok_or_else(|| AppError::PriceListNotFound(id.to_string()))?;
        list.status = status;
        list.updated_at = Utc::now();
        Ok(list.clone())
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryStore {
    async fn find_active_for_user(&self, user_id: Uuid) -> AppResult<Vec<PriceListAssignment>> {
        let state = self.state.lock();
        state.check_reads()?;
        let mut active: Vec<PriceListAssignment> = state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.assigned_at
                .cmp(&a.assigned_at)
                .then(a.price_list_id.cmp(&b.price_list_id))
        });
        Ok(active)
    }
}

#[async_trait]
impl UserProfileRepository for InMemoryStore {
    async fn find_profile(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state.profiles.get(&user_id).cloned())
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn find_wallet(&self, user_id: Uuid) -> AppResult<Option<WalletAccount>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state.wallets.get(&user_id).cloned())
    }

    async fn apply_transaction(&self, new_tx: &NewWalletTransaction) -> AppResult<LedgerApplyOutcome> {
        let mut state = self.state.lock();
        state.apply_attempts += 1;

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            debug!("Injected conflict for key {}", new_tx.idempotency_key);
            return Err(AppError::TransientConflict(
                "injected serialization failure".to_string(),
            ));
        }

        if let Some(existing) = state
            .transactions
            .iter()
            .find(|tx| tx.idempotency_key == new_tx.idempotency_key)
        {
            return Ok(LedgerApplyOutcome::Replayed(existing.clone()));
        }

        if new_tx.amount > Decimal::ZERO {
            state
                .wallets
                .entry(new_tx.user_id)
                .or_insert_with(|| WalletAccount::new(new_tx.user_id, Decimal::ZERO));
        }

        let wallet = state
            .wallets
            .get_mut(&new_tx.user_id)
            .ok_or_else(|| AppError::WalletNotFound(new_tx.user_id.to_string()))?;

        let balance_after = wallet.balance + new_tx.amount;
        if balance_after < Decimal::ZERO {
            return Ok(LedgerApplyOutcome::Insufficient {
                available: wallet.balance,
            });
        }

        let now = Utc::now();
        wallet.balance = balance_after;
        wallet.updated_at = now;

        let applied = WalletTransaction {
            id: Uuid::new_v4(),
            user_id: new_tx.user_id,
            amount: new_tx.amount,
            balance_after,
            transaction_type: new_tx.transaction_type,
            idempotency_key: new_tx.idempotency_key.clone(),
            reference_id: new_tx.metadata.reference_id.clone(),
            description: new_tx.metadata.description.clone(),
            created_at: now,
        };
        state.transactions.push(applied.clone());

        Ok(LedgerApplyOutcome::Applied(applied))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> AppResult<Option<WalletTransaction>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state
            .transactions
            .iter()
            .find(|tx| tx.idempotency_key == key)
            .cloned())
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HoldRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ShipmentHold>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state.holds.get(&id).cloned())
    }

    async fn find_storage_config(
        &self,
        courier_code: &str,
    ) -> AppResult<Option<StorageSurchargeConfig>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state.storage_configs.get(&courier_code.to_lowercase()).cloned())
    }

    async fn confirm_action(
        &self,
        confirmation: &HoldActionConfirmation,
    ) -> AppResult<Option<ShipmentHold>> {
        let mut state = self.state.lock();
        let Some(hold) = state.holds.get_mut(&confirmation.hold_id) else {
            return Ok(None);
        };
        if !hold.status.is_modifiable() {
            return Ok(None);
        }

        hold.status = HoldStatus::ActionConfirmed;
        hold.action_type = Some(confirmation.action_type);
        hold.action_cost = Some(confirmation.action_cost);
        hold.new_address = confirmation.new_address.clone();
        hold.wallet_transaction_id = confirmation.wallet_transaction_id;
        hold.updated_at = Utc::now();
        Ok(Some(hold.clone()))
    }
}

#[async_trait]
impl ProviderCostRepository for InMemoryStore {
    async fn find_recent_costs(
        &self,
        courier_code: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Decimal>> {
        let state = self.state.lock();
        state.check_reads()?;
        let courier = courier_code.to_lowercase();
        Ok(state
            .provider_costs
            .iter()
            .filter(|c| c.courier_code.to_lowercase() == courier && c.created_at >= since)
            .map(|c| c.provider_cost)
            .collect())
    }

    async fn find_by_shipment(&self, shipment_id: Uuid) -> AppResult<Option<PlatformProviderCost>> {
        let state = self.state.lock();
        state.check_reads()?;
        Ok(state
            .provider_costs
            .iter()
            .find(|c| c.shipment_id == shipment_id)
            .cloned())
    }

    async fn insert_once(&self, row: &PlatformProviderCost) -> AppResult<PlatformProviderCost> {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .provider_costs
            .iter()
            .find(|c| c.shipment_id == row.shipment_id)
        {
            return Ok(existing.clone());
        }
        state.provider_costs.push(row.clone());
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrio_core::models::{LedgerMetadata, WalletTransactionType};
    use rust_decimal_macros::dec;

    fn debit(user_id: Uuid, amount: Decimal, key: &str) -> NewWalletTransaction {
        NewWalletTransaction {
            user_id,
            amount: -amount,
            transaction_type: WalletTransactionType::Charge,
            idempotency_key: key.to_string(),
            metadata: LedgerMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_apply_refuses_negative_balance() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(5.00));

        let outcome = store.apply_transaction(&debit(user, dec!(6.00), "k1")).await.unwrap();
        assert_eq!(outcome, LedgerApplyOutcome::Insufficient { available: dec!(5.00) });
        assert!(store.transactions_of(user).is_empty());
    }

    #[tokio::test]
    async fn test_apply_replays_existing_key() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(10.00));

        let first = store.apply_transaction(&debit(user, dec!(4.00), "k1")).await.unwrap();
        let second = store.apply_transaction(&debit(user, dec!(4.00), "k1")).await.unwrap();

        let LedgerApplyOutcome::Applied(applied) = first else {
            panic!("expected applied, got {:?}", first);
        };
        assert_eq!(second, LedgerApplyOutcome::Replayed(applied));
        let wallet = store.find_wallet(user).await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(6.00));
    }

    #[tokio::test]
    async fn test_debit_without_wallet_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .apply_transaction(&debit(Uuid::new_v4(), dec!(1.00), "k1"))
            .await;
        assert!(matches!(result, Err(AppError::WalletNotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_conflicts() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(10.00));
        store.fail_next_applies(1);

        let first = store.apply_transaction(&debit(user, dec!(1.00), "k1")).await;
        assert!(matches!(first, Err(AppError::TransientConflict(_))));
        assert!(store.apply_transaction(&debit(user, dec!(1.00), "k1")).await.is_ok());
        assert_eq!(store.apply_attempts(), 2);
    }
}
