//! Price list repository implementation
//!
//! PostgreSQL-backed storage for price lists, their weight/zone tiers and
//! user assignments.

use carrio_core::{
    models::{PriceList, PriceListAssignment, PriceListEntry, PriceListStatus, PriceListType},
    traits::{AssignmentRepository, PriceListRepository},
    vat::{VatMode, DEFAULT_VAT_RATE},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::error::map_db_error;

const PRICE_LIST_COLUMNS: &str = r#"
    id, name, list_type, status, courier_code, master_list_id,
    vat_mode, vat_rate, default_margin_percent, created_by,
    metadata, created_at, updated_at
"#;

/// PostgreSQL implementation of PriceListRepository and AssignmentRepository
pub struct PgPriceListRepository {
    pool: PgPool,
}

impl PgPriceListRepository {
    /// Create a new price list repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_list(&self, id: Uuid) -> AppResult<Option<PriceList>> {
        let sql = format!("SELECT {} FROM price_lists WHERE id = $1", PRICE_LIST_COLUMNS);

        let row = sqlx::query_as::<sqlx::Postgres, PriceListRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding price list {}: {}", id, e);
                map_db_error("Failed to find price list", e)
            })?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl PriceListRepository for PgPriceListRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PriceList>> {
        debug!("Finding price list by id: {}", id);
        self.fetch_list(id).await
    }

    #[instrument(skip(self))]
    async fn find_entries(
        &self,
        price_list_id: Uuid,
        service_type: Option<&str>,
    ) -> AppResult<Vec<PriceListEntry>> {
        debug!(
            "Loading entries of price list {} (service type {:?})",
            price_list_id, service_type
        );

        let rows = sqlx::query_as::<sqlx::Postgres, PriceListEntryRow>(
            r#"
            SELECT
                id, price_list_id, weight_from, weight_to, zone_code,
                service_type, base_price, fuel_surcharge_percent,
                island_surcharge, delivery_days
            FROM price_list_entries
            WHERE price_list_id = $1
              AND ($2::TEXT IS NULL OR service_type = $2)
            ORDER BY zone_code, service_type, weight_from
            "#,
        )
        .bind(price_list_id)
        .bind(service_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading entries of {}: {}", price_list_id, e);
            map_db_error("Failed to load price list entries", e)
        })?;

        debug!("Loaded {} entries", rows.len());
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count_entries(&self, price_list_id: Uuid) -> AppResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_list_entries WHERE price_list_id = $1")
                .bind(price_list_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_db_error("Failed to count price list entries", e))?;

        Ok(count.0)
    }

    #[instrument(skip(self))]
    async fn find_platform_lists_for_courier(
        &self,
        courier_code: &str,
    ) -> AppResult<Vec<PriceList>> {
        debug!("Finding platform lists for courier {}", courier_code);

        let sql = format!(
            r#"
            SELECT {}
            FROM price_lists
            WHERE status = 'active'
              AND list_type IN ('global', 'supplier')
              AND (LOWER(courier_code) = LOWER($1)
                   OR LOWER(name) LIKE '%' || LOWER($1) || '%')
            ORDER BY updated_at DESC
            "#,
            PRICE_LIST_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, PriceListRow>(&sql)
            .bind(courier_code)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding lists for {}: {}", courier_code, e);
                map_db_error("Failed to find platform price lists", e)
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, metadata))]
    async fn update_metadata(&self, id: Uuid, metadata: &Value) -> AppResult<PriceList> {
        let sql = format!(
            r#"
            UPDATE price_lists
            SET metadata = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRICE_LIST_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, PriceListRow>(&sql)
            .bind(id)
            .bind(metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to update metadata of price list {}: {}", id, e);
                map_db_error("Failed to update price list metadata", e)
            })?
            .ok_or_else(|| AppError::PriceListNotFound(id.to_string()))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: Uuid, status: PriceListStatus) -> AppResult<PriceList> {
        let sql = format!(
            r#"
            UPDATE price_lists
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRICE_LIST_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, PriceListRow>(&sql)
            .bind(id)
            .bind(status.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to update status of price list {}: {}", id, e);
                map_db_error("Failed to update price list status", e)
            })?
            .ok_or_else(|| AppError::PriceListNotFound(id.to_string()))?;

        Ok(row.into())
    }
}

#[async_trait]
impl AssignmentRepository for PgPriceListRepository {
    #[instrument(skip(self))]
    async fn find_active_for_user(&self, user_id: Uuid) -> AppResult<Vec<PriceListAssignment>> {
        let rows = sqlx::query_as::<sqlx::Postgres, AssignmentRow>(
            r#"
            SELECT user_id, price_list_id, assigned_by, assigned_by_platform,
                   assigned_at, revoked_at
            FROM price_list_assignments
            WHERE user_id = $1 AND revoked_at IS NULL
            ORDER BY assigned_at DESC, price_list_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading assignments of {}: {}", user_id, e);
            map_db_error("Failed to load price list assignments", e)
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Internal row type for price lists
#[derive(Debug, sqlx::FromRow)]
struct PriceListRow {
    id: Uuid,
    name: String,
    list_type: String,
    status: String,
    courier_code: Option<String>,
    master_list_id: Option<Uuid>,
    vat_mode: Option<String>,
    vat_rate: Option<Decimal>,
    default_margin_percent: Option<Decimal>,
    created_by: Option<Uuid>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PriceListRow> for PriceList {
    fn from(row: PriceListRow) -> Self {
        let list_type = PriceListType::from_str(&row.list_type).unwrap_or_else(|| {
            warn!("Unknown list type '{}' on {}", row.list_type, row.id);
            PriceListType::Custom
        });

        Self {
            id: row.id,
            name: row.name,
            list_type,
            status: PriceListStatus::from_str(&row.status).unwrap_or(PriceListStatus::Draft),
            courier_code: row.courier_code,
            master_list_id: row.master_list_id,
            // Legacy values stay `None` and read as excluded
            vat_mode: row.vat_mode.as_deref().and_then(VatMode::from_str),
            vat_rate: row.vat_rate.unwrap_or(DEFAULT_VAT_RATE),
            default_margin_percent: row.default_margin_percent,
            created_by: row.created_by,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PriceListEntryRow {
    id: Uuid,
    price_list_id: Uuid,
    weight_from: Decimal,
    weight_to: Decimal,
    zone_code: String,
    service_type: String,
    base_price: Decimal,
    fuel_surcharge_percent: Option<Decimal>,
    island_surcharge: Option<Decimal>,
    delivery_days: Option<i32>,
}

impl From<PriceListEntryRow> for PriceListEntry {
    fn from(row: PriceListEntryRow) -> Self {
        Self {
            id: row.id,
            price_list_id: row.price_list_id,
            weight_from: row.weight_from,
            weight_to: row.weight_to,
            zone_code: row.zone_code,
            service_type: row.service_type,
            base_price: row.base_price,
            fuel_surcharge_percent: row.fuel_surcharge_percent,
            island_surcharge: row.island_surcharge,
            delivery_days: row.delivery_days,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AssignmentRow {
    user_id: Uuid,
    price_list_id: Uuid,
    assigned_by: Option<Uuid>,
    assigned_by_platform: bool,
    assigned_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<AssignmentRow> for PriceListAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            user_id: row.user_id,
            price_list_id: row.price_list_id,
            assigned_by: row.assigned_by,
            assigned_by_platform: row.assigned_by_platform,
            assigned_at: row.assigned_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_vat_mode_row_maps_to_none() {
        let row = PriceListRow {
            id: Uuid::new_v4(),
            name: "Legacy".to_string(),
            list_type: "supplier".to_string(),
            status: "active".to_string(),
            courier_code: Some("BRT".to_string()),
            master_list_id: None,
            vat_mode: Some("iva_esclusa_22".to_string()),
            vat_rate: None,
            default_margin_percent: None,
            created_by: None,
            metadata: Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let list: PriceList = row.into();
        assert_eq!(list.vat_mode, None);
        assert_eq!(list.vat_mode(), VatMode::Excluded);
        assert_eq!(list.list_type, PriceListType::Supplier);
        assert!(list.is_active());
        assert_eq!(list.vat_rate, DEFAULT_VAT_RATE);
    }
}
