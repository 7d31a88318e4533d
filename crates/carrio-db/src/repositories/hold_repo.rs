//! Shipment hold repository implementation
//!
//! Holds and the per-courier storage-surcharge configuration. The action
//! confirmation is a conditional update that only matches open holds.

use carrio_core::{
    models::{
        ActionFee, Address, HoldActionType, HoldStatus, ShipmentHold, StorageSurchargeConfig,
    },
    traits::{HoldActionConfirmation, HoldRepository},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::map_db_error;

const HOLD_COLUMNS: &str = r#"
    id, user_id, shipment_id, courier_code, shipment_cost, reason,
    status, action_type, action_cost, new_address, wallet_transaction_id,
    opened_at, updated_at
"#;

/// PostgreSQL implementation of HoldRepository
pub struct PgHoldRepository {
    pool: PgPool,
}

impl PgHoldRepository {
    /// Create a new hold repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HoldRepository for PgHoldRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ShipmentHold>> {
        debug!("Finding hold by id: {}", id);

        let sql = format!("SELECT {} FROM shipment_holds WHERE id = $1", HOLD_COLUMNS);

        let row = sqlx::query_as::<sqlx::Postgres, HoldRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding hold {}: {}", id, e);
                map_db_error("Failed to find hold", e)
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn find_storage_config(
        &self,
        courier_code: &str,
    ) -> AppResult<Option<StorageSurchargeConfig>> {
        let row = sqlx::query_as::<sqlx::Postgres, StorageConfigRow>(
            r#"
            SELECT courier_code, dossier_fee, actions
            FROM courier_storage_configs
            WHERE LOWER(courier_code) = LOWER($1)
            "#,
        )
        .bind(courier_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading storage config {}: {}", courier_code, e);
            map_db_error("Failed to load storage configuration", e)
        })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, confirmation), fields(hold_id = %confirmation.hold_id))]
    async fn confirm_action(
        &self,
        confirmation: &HoldActionConfirmation,
    ) -> AppResult<Option<ShipmentHold>> {
        let new_address = confirmation
            .new_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let sql = format!(
            r#"
            UPDATE shipment_holds
            SET status = 'action_confirmed',
                action_type = $2,
                action_cost = $3,
                new_address = $4,
                wallet_transaction_id = $5,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'open'
            RETURNING {}
            "#,
            HOLD_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, HoldRow>(&sql)
            .bind(confirmation.hold_id)
            .bind(confirmation.action_type.to_string())
            .bind(confirmation.action_cost)
            .bind(new_address)
            .bind(confirmation.wallet_transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to confirm hold {}: {}", confirmation.hold_id, e);
                map_db_error("Failed to confirm hold action", e)
            })?;

        match row {
            Some(row) => {
                info!(
                    "Hold {} confirmed with action {}",
                    confirmation.hold_id, confirmation.action_type
                );
                Ok(Some(row.try_into()?))
            }
            None => {
                warn!("Hold {} was no longer open", confirmation.hold_id);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    user_id: Uuid,
    shipment_id: Uuid,
    courier_code: String,
    shipment_cost: Decimal,
    reason: Option<String>,
    status: String,
    action_type: Option<String>,
    action_cost: Option<Decimal>,
    new_address: Option<Value>,
    wallet_transaction_id: Option<Uuid>,
    opened_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for ShipmentHold {
    type Error = AppError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        let status = HoldStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown hold status '{}' on {}", row.status, row.id))
        })?;

        let action_type = match row.action_type.as_deref() {
            Some(raw) => Some(HoldActionType::from_str(raw).ok_or_else(|| {
                AppError::Internal(format!("Unknown hold action '{}' on {}", raw, row.id))
            })?),
            None => None,
        };

        let new_address = row
            .new_address
            .map(serde_json::from_value::<Address>)
            .transpose()?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            shipment_id: row.shipment_id,
            courier_code: row.courier_code,
            shipment_cost: row.shipment_cost,
            reason: row.reason,
            status,
            action_type,
            action_cost: row.action_cost,
            new_address,
            wallet_transaction_id: row.wallet_transaction_id,
            opened_at: row.opened_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StorageConfigRow {
    courier_code: String,
    dossier_fee: Decimal,
    actions: Value,
}

impl TryFrom<StorageConfigRow> for StorageSurchargeConfig {
    type Error = AppError;

    fn try_from(row: StorageConfigRow) -> Result<Self, Self::Error> {
        let raw: HashMap<String, ActionFee> = serde_json::from_value(row.actions)?;

        let mut actions = HashMap::with_capacity(raw.len());
        for (name, fee) in raw {
            match HoldActionType::from_str(&name) {
                Some(action) => {
                    actions.insert(action, fee);
                }
                None => warn!(
                    "Ignoring unknown action '{}' in storage config of {}",
                    name, row.courier_code
                ),
            }
        }

        Ok(Self {
            courier_code: row.courier_code,
            dossier_fee: row.dossier_fee,
            actions,
        })
    }
}
