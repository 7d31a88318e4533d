//! Provider cost repository implementation
//!
//! Write-once bookkeeping of what the platform pays carriers, one row per
//! shipment.

use carrio_core::{
    models::{ApiSource, CostConfidence, CostSource, PlatformProviderCost},
    traits::ProviderCostRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::error::map_db_error;

const COST_COLUMNS: &str = r#"
    id, shipment_id, user_id, courier_code, api_source, provider_cost,
    billed_amount, margin, confidence, source, master_price_list_id,
    reason, created_at
"#;

/// PostgreSQL implementation of ProviderCostRepository
pub struct PgProviderCostRepository {
    pool: PgPool,
}

impl PgProviderCostRepository {
    /// Create a new provider cost repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderCostRepository for PgProviderCostRepository {
    #[instrument(skip(self))]
    async fn find_recent_costs(
        &self,
        courier_code: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Decimal>> {
        let rows: Vec<(Decimal,)> = sqlx::query_as(
            r#"
            SELECT provider_cost
            FROM platform_provider_costs
            WHERE LOWER(courier_code) = LOWER($1)
              AND created_at >= $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(courier_code)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading cost history of {}: {}", courier_code, e);
            map_db_error("Failed to load provider cost history", e)
        })?;

        debug!("Found {} recent costs for {}", rows.len(), courier_code);
        Ok(rows.into_iter().map(|(cost,)| cost).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_shipment(&self, shipment_id: Uuid) -> AppResult<Option<PlatformProviderCost>> {
        let sql = format!(
            "SELECT {} FROM platform_provider_costs WHERE shipment_id = $1",
            COST_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, ProviderCostRow>(&sql)
            .bind(shipment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find provider cost", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, row), fields(shipment_id = %row.shipment_id))]
    async fn insert_once(&self, row: &PlatformProviderCost) -> AppResult<PlatformProviderCost> {
        sqlx::query(
            r#"
            INSERT INTO platform_provider_costs (
                id, shipment_id, user_id, courier_code, api_source, provider_cost,
                billed_amount, margin, confidence, source, master_price_list_id,
                reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (shipment_id) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(row.shipment_id)
        .bind(row.user_id)
        .bind(&row.courier_code)
        .bind(row.api_source.to_string())
        .bind(row.provider_cost)
        .bind(row.billed_amount)
        .bind(row.margin)
        .bind(row.confidence.to_string())
        .bind(row.source.to_string())
        .bind(row.master_price_list_id)
        .bind(&row.reason)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to insert provider cost: {}", e);
            map_db_error("Failed to insert provider cost", e)
        })?;

        self.find_by_shipment(row.shipment_id)
            .await?
            .ok_or_else(|| AppError::Internal("Provider cost row vanished after insert".into()))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProviderCostRow {
    id: Uuid,
    shipment_id: Uuid,
    user_id: Uuid,
    courier_code: String,
    api_source: String,
    provider_cost: Decimal,
    billed_amount: Decimal,
    margin: Decimal,
    confidence: String,
    source: String,
    master_price_list_id: Option<Uuid>,
    reason: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProviderCostRow> for PlatformProviderCost {
    type Error = AppError;

    fn try_from(row: ProviderCostRow) -> Result<Self, Self::Error> {
        let unknown = |field: &str, value: &str| {
            AppError::Internal(format!("Unknown {} '{}' on cost row {}", field, value, row.id))
        };

        Ok(Self {
            api_source: ApiSource::from_str(&row.api_source)
                .ok_or_else(|| unknown("api source", &row.api_source))?,
            confidence: CostConfidence::from_str(&row.confidence)
                .ok_or_else(|| unknown("confidence", &row.confidence))?,
            source: CostSource::from_str(&row.source)
                .ok_or_else(|| unknown("source", &row.source))?,
            id: row.id,
            shipment_id: row.shipment_id,
            user_id: row.user_id,
            courier_code: row.courier_code,
            provider_cost: row.provider_cost,
            billed_amount: row.billed_amount,
            margin: row.margin,
            master_price_list_id: row.master_price_list_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}
