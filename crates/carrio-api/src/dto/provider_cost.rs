//! Provider cost DTOs

use carrio_core::models::{ApiSourceDecision, ProviderCostEstimate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Provider cost estimate request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProviderCostRequest {
    pub user_id: Uuid,

    #[validate(length(min = 1, max = 50, message = "courier_code is required"))]
    pub courier_code: String,

    /// List the shipment was priced with, if known
    pub price_list_id: Option<Uuid>,

    /// Parcel weight in kg
    pub weight: Decimal,

    #[validate(length(min = 1, max = 50, message = "zone_code is required"))]
    pub zone_code: String,

    #[validate(length(min = 1, max = 50))]
    pub service_type: Option<String>,
}

/// Attribution and cost of one shipment
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCostResponse {
    pub decision: ApiSourceDecision,
    pub estimate: ProviderCostEstimate,
}
