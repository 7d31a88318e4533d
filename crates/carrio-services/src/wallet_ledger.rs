//! Wallet ledger
//!
//! The only component that moves a balance. Every movement goes through
//! the store's atomic primitive under an idempotency key, and transient
//! conflicts re-run that primitive with bounded exponential backoff.

use carrio_core::{
    config::WalletConfig,
    models::{
        CreditCheck, LedgerApplyOutcome, LedgerMetadata, NewWalletTransaction, WalletAccount,
        WalletMovement, WalletTransaction, WalletTransactionType,
    },
    traits::WalletStore,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::retry::{with_retry, RetryConfig};

/// Wallet ledger service
pub struct WalletLedger<W> {
    store: Arc<W>,
    retry: RetryConfig,
}

impl<W: WalletStore> WalletLedger<W> {
    /// Create a new ledger with the configured retry policy
    pub fn new(store: Arc<W>, config: &WalletConfig) -> Self {
        Self::with_retry_config(store, RetryConfig::from(config))
    }

    pub fn with_retry_config(store: Arc<W>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Advisory credit pre-check
    ///
    /// Read-only; the balance may change before the debit. A user without a
    /// wallet has a zero balance.
    #[instrument(skip(self))]
    pub async fn check_credit_before_booking(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> AppResult<CreditCheck> {
        let balance = self
            .store
            .find_wallet(user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO);

        let check = CreditCheck::new(balance, amount);
        if !check.sufficient {
            debug!(
                "Credit check failed for {}: required {}, balance {}",
                user_id, amount, balance
            );
        }
        Ok(check)
    }

    /// Charge a shipment
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        idempotency_key: &str,
        metadata: LedgerMetadata,
    ) -> AppResult<WalletMovement> {
        self.debit_as(
            user_id,
            amount,
            idempotency_key,
            WalletTransactionType::Charge,
            metadata,
        )
        .await
    }

    /// Debit `amount` recorded under a specific transaction type
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for non-positive amounts or an empty key
    /// - `InsufficientFunds` when the balance does not cover the amount
    /// - `WalletNotFound` when the user has no wallet
    /// - `RetriesExhausted` when every attempt hit a transient conflict
    #[instrument(skip(self, metadata))]
    pub async fn debit_as(
        &self,
        user_id: Uuid,
        amount: Decimal,
        idempotency_key: &str,
        transaction_type: WalletTransactionType,
        metadata: LedgerMetadata,
    ) -> AppResult<WalletMovement> {
        Self::validate(amount, idempotency_key)?;
        self.apply(NewWalletTransaction {
            user_id,
            amount: -amount,
            transaction_type,
            idempotency_key: idempotency_key.to_string(),
            metadata,
        })
        .await
    }

    /// Top up a wallet, opening it on first use
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        idempotency_key: &str,
        metadata: LedgerMetadata,
    ) -> AppResult<WalletMovement> {
        self.credit_as(
            user_id,
            amount,
            idempotency_key,
            WalletTransactionType::TopUp,
            metadata,
        )
        .await
    }

    /// Credit `amount` recorded under a specific transaction type
    #[instrument(skip(self, metadata))]
    pub async fn credit_as(
        &self,
        user_id: Uuid,
        amount: Decimal,
        idempotency_key: &str,
        transaction_type: WalletTransactionType,
        metadata: LedgerMetadata,
    ) -> AppResult<WalletMovement> {
        Self::validate(amount, idempotency_key)?;
        self.apply(NewWalletTransaction {
            user_id,
            amount,
            transaction_type,
            idempotency_key: idempotency_key.to_string(),
            metadata,
        })
        .await
    }

    /// Current wallet of a user
    #[instrument(skip(self))]
    pub async fn balance(&self, user_id: Uuid) -> AppResult<WalletAccount> {
        self.store
            .find_wallet(user_id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(user_id.to_string()))
    }

    /// Ledger row already booked under `idempotency_key` for `user_id`
    pub async fn find_movement(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> AppResult<Option<WalletTransaction>> {
        Ok(self
            .store
            .find_by_idempotency_key(idempotency_key)
            .await?
            .filter(|tx| tx.user_id == user_id))
    }

    /// Most recent ledger rows of a user
    pub async fn transactions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>> {
        self.store.list_transactions(user_id, limit).await
    }

    fn validate(amount: Decimal, idempotency_key: &str) -> AppResult<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if idempotency_key.trim().is_empty() {
            return Err(AppError::MissingField("idempotency_key".to_string()));
        }
        Ok(())
    }

    async fn apply(&self, new_tx: NewWalletTransaction) -> AppResult<WalletMovement> {
        let outcome = with_retry(&self.retry, || self.store.apply_transaction(&new_tx)).await?;

        match outcome {
            LedgerApplyOutcome::Applied(tx) => {
                info!(
                    "Wallet {} moved {} ({}), balance now {}",
                    tx.user_id, tx.amount, tx.transaction_type, tx.balance_after
                );
                Ok(WalletMovement::from_transaction(&tx, false))
            }
            LedgerApplyOutcome::Replayed(tx) => {
                if tx.user_id != new_tx.user_id {
                    warn!(
                        "Idempotency key {} belongs to another wallet",
                        new_tx.idempotency_key
                    );
                    return Err(AppError::Conflict(format!(
                        "idempotency key {} was already used by another wallet",
                        new_tx.idempotency_key
                    )));
                }
                if tx.amount != new_tx.amount {
                    warn!(
                        "Replay of {} with amount {} returns the original {}",
                        new_tx.idempotency_key, new_tx.amount, tx.amount
                    );
                }
                debug!("Replayed {} as {}", new_tx.idempotency_key, tx.id);
                Ok(WalletMovement::from_transaction(&tx, true))
            }
            LedgerApplyOutcome::Insufficient { available } => {
                warn!(
                    "Insufficient funds for {}: required {}, available {}",
                    new_tx.user_id,
                    new_tx.amount.abs(),
                    available
                );
                Err(AppError::InsufficientFunds {
                    required: new_tx.amount.abs().to_string(),
                    available: available.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrio_db::InMemoryStore;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn ledger(store: &InMemoryStore) -> WalletLedger<InMemoryStore> {
        WalletLedger::with_retry_config(
            Arc::new(store.clone()),
            RetryConfig {
                max_attempts: 4,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
                backoff_factor: 2.0,
            },
        )
    }

    #[tokio::test]
    async fn test_idempotent_debit() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(25.00));
        let ledger = ledger(&store);

        let first = ledger
            .debit(user, dec!(10.00), "key-1", LedgerMetadata::default())
            .await
            .unwrap();
        let second = ledger
            .debit(user, dec!(10.00), "key-1", LedgerMetadata::default())
            .await
            .unwrap();

        assert_eq!(first.new_balance, dec!(15.00));
        assert!(!first.replayed);
        assert_eq!(second.transaction_id, first.transaction_id);
        assert_eq!(second.new_balance, dec!(15.00));
        assert!(second.replayed);
        assert_eq!(store.transactions_of(user).len(), 1);
        assert_eq!(ledger.balance(user).await.unwrap().balance, dec!(15.00));
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_balance() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(5.00));
        let ledger = ledger(&store);

        let err = ledger
            .debit(user, dec!(5.01), "key-1", LedgerMetadata::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::InsufficientFunds {
                required: "5.01".to_string(),
                available: "5.00".to_string(),
            }
        );
        assert_eq!(ledger.balance(user).await.unwrap().balance, dec!(5.00));
        assert!(store.transactions_of(user).is_empty());
    }

    #[tokio::test]
    async fn test_retries_transient_conflicts() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(10.00));
        store.fail_next_applies(2);
        let ledger = ledger(&store);

        let movement = ledger
            .debit(user, dec!(3.00), "key-1", LedgerMetadata::default())
            .await
            .unwrap();

        assert_eq!(movement.new_balance, dec!(7.00));
        assert_eq!(store.apply_attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_reported() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(10.00));
        store.fail_next_applies(10);
        let ledger = ledger(&store);

        let err = ledger
            .debit(user, dec!(3.00), "key-1", LedgerMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(ledger.balance(user).await.unwrap().balance, dec!(10.00));
    }

    #[tokio::test]
    async fn test_amount_and_key_validation() {
        let store = InMemoryStore::new();
        let ledger = ledger(&store);
        let user = Uuid::new_v4();

        let err = ledger
            .debit(user, dec!(0), "key-1", LedgerMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = ledger
            .credit(user, dec!(-5), "key-1", LedgerMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = ledger
            .credit(user, dec!(5), "  ", LedgerMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField(_)));
    }

    #[tokio::test]
    async fn test_credit_opens_wallet() {
        let store = InMemoryStore::new();
        let ledger = ledger(&store);
        let user = Uuid::new_v4();

        assert!(matches!(
            ledger.balance(user).await,
            Err(AppError::WalletNotFound(_))
        ));
        let check = ledger.check_credit_before_booking(user, dec!(1)).await.unwrap();
        assert!(!check.sufficient);
        assert_eq!(check.shortfall, dec!(1));

        let movement = ledger
            .credit(user, dec!(20.00), "topup-1", LedgerMetadata::reference("stripe:pi_1"))
            .await
            .unwrap();
        assert_eq!(movement.new_balance, dec!(20.00));

        let txs = ledger.transactions(user, 10).await.unwrap();
        assert_eq!(txs[0].transaction_type, WalletTransactionType::TopUp);
        assert_eq!(txs[0].reference_id.as_deref(), Some("stripe:pi_1"));
    }

    #[tokio::test]
    async fn test_key_reused_by_another_wallet_is_conflict() {
        let store = InMemoryStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        store.set_balance(alice, dec!(10));
        store.set_balance(bob, dec!(10));
        let ledger = ledger(&store);

        ledger
            .debit(alice, dec!(1), "shared", LedgerMetadata::default())
            .await
            .unwrap();
        let err = ledger
            .debit(bob, dec!(1), "shared", LedgerMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let booked = ledger.find_movement(alice, "shared").await.unwrap().unwrap();
        assert_eq!(booked.amount, dec!(-1));
        assert!(ledger.find_movement(bob, "shared").await.unwrap().is_none());
        assert!(ledger.find_movement(alice, "other").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, dec!(10.00));
        let ledger = Arc::new(ledger(&store));

        let tasks = (0..25).map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .debit(user, dec!(1.00), &format!("ship-{}", i), LedgerMetadata::default())
                    .await
            })
        });
        let results = futures::future::join_all(tasks).await;

        let succeeded = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(succeeded, 10);
        assert_eq!(ledger.balance(user).await.unwrap().balance, dec!(0.00));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Debit(i64),
        Credit(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..5_000).prop_map(Op::Debit),
            (1i64..5_000).prop_map(Op::Credit),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_never_negative(ops in proptest::collection::vec(op(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let store = InMemoryStore::new();
                let user = Uuid::new_v4();
                store.set_balance(user, dec!(20.00));
                let ledger = ledger(&store);
                let mut expected = dec!(20.00);

                for (i, op) in ops.iter().enumerate() {
                    let key = format!("op-{}", i);
                    match op {
                        Op::Debit(cents) => {
                            let amount = Decimal::new(*cents, 2);
                            match ledger.debit(user, amount, &key, LedgerMetadata::default()).await {
                                Ok(_) => expected -= amount,
                                Err(AppError::InsufficientFunds { .. }) => prop_assert!(amount > expected),
                                Err(e) => prop_assert!(false, "unexpected error {}", e),
                            }
                        }
                        Op::Credit(cents) => {
                            let amount = Decimal::new(*cents, 2);
                            ledger.credit(user, amount, &key, LedgerMetadata::default()).await.unwrap();
                            expected += amount;
                        }
                    }

                    let balance = ledger.balance(user).await.unwrap().balance;
                    prop_assert!(balance >= Decimal::ZERO);
                    prop_assert_eq!(balance, expected);
                }
                Ok(())
            })?;
        }
    }
}
