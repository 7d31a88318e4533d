//! Provider cost bookkeeping models
//!
//! Records what the platform itself is estimated to pay the carrier for a
//! shipment. Used for margin reporting only, never for customer pricing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Contract a shipment was booked under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiSource {
    /// Platform contract
    Platform,
    /// Reseller's own contract
    ResellerOwn,
    /// User's own carrier contract
    ByocOwn,
}

impl fmt::Display for ApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiSource::Platform => write!(f, "platform"),
            ApiSource::ResellerOwn => write!(f, "reseller_own"),
            ApiSource::ByocOwn => write!(f, "byoc_own"),
        }
    }
}

impl ApiSource {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "platform" => Some(ApiSource::Platform),
            "reseller_own" => Some(ApiSource::ResellerOwn),
            "byoc_own" => Some(ApiSource::ByocOwn),
            _ => None,
        }
    }
}

/// Confidence of a cost estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostConfidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for CostConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostConfidence::High => write!(f, "high"),
            CostConfidence::Medium => write!(f, "medium"),
            CostConfidence::Low => write!(f, "low"),
        }
    }
}

impl CostConfidence {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(CostConfidence::High),
            "medium" => Some(CostConfidence::Medium),
            "low" => Some(CostConfidence::Low),
            _ => None,
        }
    }
}

/// Where an estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    MasterList,
    HistoricalAvg,
    Estimate,
}

impl fmt::Display for CostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostSource::MasterList => write!(f, "master_list"),
            CostSource::HistoricalAvg => write!(f, "historical_avg"),
            CostSource::Estimate => write!(f, "estimate"),
        }
    }
}

impl CostSource {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "master_list" => Some(CostSource::MasterList),
            "historical_avg" => Some(CostSource::HistoricalAvg),
            "estimate" => Some(CostSource::Estimate),
            _ => None,
        }
    }
}

/// Outcome of attributing a shipment to a contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiSourceDecision {
    pub api_source: ApiSource,
    pub master_price_list_id: Option<Uuid>,
    /// Why this branch was taken; kept for audit
    pub reason: String,
}

/// Estimated provider cost
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCostEstimate {
    pub cost: Decimal,
    pub source: CostSource,
    pub confidence: CostConfidence,
}

/// Shipment facts needed to book provider cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCostInput {
    pub shipment_id: Uuid,
    pub user_id: Uuid,
    pub courier_code: String,
    pub price_list_id: Option<Uuid>,
    pub weight: Decimal,
    pub zone_code: String,
    pub service_type: String,
    /// What the customer was charged
    pub billed_amount: Decimal,
}

/// Provider cost row, one per shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformProviderCost {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub user_id: Uuid,
    pub courier_code: String,
    pub api_source: ApiSource,
    pub provider_cost: Decimal,
    pub billed_amount: Decimal,
    /// `billed_amount - provider_cost`
    pub margin: Decimal,
    pub confidence: CostConfidence,
    pub source: CostSource,
    pub master_price_list_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl PlatformProviderCost {
    /// Margin in percent of the billed amount, `None` when nothing was billed
    pub fn margin_percent(&self) -> Option<Decimal> {
        if self.billed_amount.is_zero() {
            return None;
        }
        Some(self.margin * Decimal::ONE_HUNDRED / self.billed_amount)
    }
}
