//! Wallet store implementation
//!
//! Balance updates and ledger inserts happen in one PostgreSQL transaction:
//! the wallet row is locked, the idempotency key is checked, the balance is
//! moved with a conditional update that refuses to go negative, and the
//! ledger row is written before commit.

use carrio_core::{
    models::{
        LedgerApplyOutcome, NewWalletTransaction, WalletAccount, WalletTransaction,
        WalletTransactionType,
    },
    traits::WalletStore,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{map_db_error, map_ledger_error};

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, amount, balance_after, transaction_type,
    idempotency_key, reference_id, description, created_at
"#;

/// PostgreSQL implementation of WalletStore
pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    /// Create a new wallet store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_key_in(
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> AppResult<Option<WalletTransaction>> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE idempotency_key = $1",
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, WalletTransactionRow>(&sql)
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_db_error("Failed to look up idempotency key", e))?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl WalletStore for PgWalletStore {
    #[instrument(skip(self))]
    async fn find_wallet(&self, user_id: Uuid) -> AppResult<Option<WalletAccount>> {
        debug!("Finding wallet of user {}", user_id);

        let row = sqlx::query_as::<sqlx::Postgres, WalletRow>(
            r#"
            SELECT user_id, balance, currency, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding wallet {}: {}", user_id, e);
            map_db_error("Failed to find wallet", e)
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, new_tx), fields(user_id = %new_tx.user_id, key = %new_tx.idempotency_key))]
    async fn apply_transaction(
        &self,
        new_tx: &NewWalletTransaction,
    ) -> AppResult<LedgerApplyOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Replay path: the key was already applied by an earlier call
        if let Some(existing) = Self::find_key_in(&mut tx, &new_tx.idempotency_key).await? {
            debug!("Idempotency key already applied as {}", existing.id);
            tx.commit().await.map_err(|e| map_db_error("Failed to commit replay", e))?;
            return Ok(LedgerApplyOutcome::Replayed(existing));
        }

        // Top-ups open the wallet on first use
        if new_tx.amount > Decimal::ZERO {
            sqlx::query(
                r#"
                INSERT INTO wallets (user_id, balance)
                VALUES ($1, 0)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(new_tx.user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to open wallet", e))?;
        }

        // Lock wallet row
        let current: Option<(Decimal,)> =
            sqlx::query_as("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
                .bind(new_tx.user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to lock wallet: {}", e);
                    map_db_error("Failed to lock wallet", e)
                })?;

        let (available,) =
            current.ok_or_else(|| AppError::WalletNotFound(new_tx.user_id.to_string()))?;

        // Conditional update: never below zero, even if the lock is bypassed
        let updated: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                updated_at = NOW()
            WHERE user_id = $1
              AND balance + $2 >= 0
            RETURNING balance
            "#,
        )
        .bind(new_tx.user_id)
        .bind(new_tx.amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to update wallet balance: {}", e);
            map_db_error("Failed to update balance", e)
        })?;

        let Some((balance_after,)) = updated else {
            warn!(
                "Insufficient funds for user {}: movement {}, available {}",
                new_tx.user_id, new_tx.amount, available
            );
            tx.rollback()
                .await
                .map_err(|e| map_db_error("Failed to roll back", e))?;
            return Ok(LedgerApplyOutcome::Insufficient { available });
        };

        let sql = format!(
            r#"
            INSERT INTO wallet_transactions (
                id, user_id, amount, balance_after, transaction_type,
                idempotency_key, reference_id, description, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, WalletTransactionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_tx.user_id)
            .bind(new_tx.amount)
            .bind(balance_after)
            .bind(new_tx.transaction_type.to_string())
            .bind(&new_tx.idempotency_key)
            .bind(&new_tx.metadata.reference_id)
            .bind(&new_tx.metadata.description)
            .bind(&new_tx.metadata.extra)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to insert ledger row: {}", e);
                map_ledger_error("Failed to insert ledger row", e)
            })?;

        // Commit transaction
        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            map_db_error("Failed to commit wallet transaction", e)
        })?;

        let applied: WalletTransaction = row.into();
        info!(
            "Applied {} {} to wallet {}: balance {} -> {}",
            applied.transaction_type, applied.amount, applied.user_id, available, balance_after
        );

        Ok(LedgerApplyOutcome::Applied(applied))
    }

    #[instrument(skip(self))]
    async fn find_by_idempotency_key(&self, key: &str) -> AppResult<Option<WalletTransaction>> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE idempotency_key = $1",
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, WalletTransactionRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find ledger row", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<WalletTransaction>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            TRANSACTION_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, WalletTransactionRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list ledger rows", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    user_id: Uuid,
    balance: Decimal,
    currency: String,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for WalletAccount {
    fn from(row: WalletRow) -> Self {
        Self {
            user_id: row.user_id,
            balance: row.balance,
            currency: row.currency,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletTransactionRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    balance_after: Decimal,
    transaction_type: String,
    idempotency_key: String,
    reference_id: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<WalletTransactionRow> for WalletTransaction {
    fn from(row: WalletTransactionRow) -> Self {
        let transaction_type = WalletTransactionType::from_str(&row.transaction_type)
            .unwrap_or_else(|| {
                warn!(
                    "Unknown transaction type '{}' on ledger row {}",
                    row.transaction_type, row.id
                );
                WalletTransactionType::Adjustment
            });

        Self {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            balance_after: row.balance_after,
            transaction_type,
            idempotency_key: row.idempotency_key,
            reference_id: row.reference_id,
            description: row.description,
            created_at: row.created_at,
        }
    }
}
