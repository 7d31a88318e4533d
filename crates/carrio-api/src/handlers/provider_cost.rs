//! Provider cost handlers

use crate::dto::{ApiResponse, ProviderCostRequest, ProviderCostResponse};
use crate::state::{AppState, Stores};
use actix_web::{web, HttpResponse};
use carrio_core::AppError;
use rust_decimal::Decimal;
use tracing::{instrument, warn};
use validator::Validate;

/// Attribute a shipment and estimate what the carrier charges for it
///
/// POST /api/v1/provider-costs/estimate
#[instrument(skip(state, req))]
pub async fn estimate<S: Stores>(
    state: web::Data<AppState<S>>,
    req: web::Json<ProviderCostRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Provider cost request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    if req.weight <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!(
            "weight must be positive, got {}",
            req.weight
        )));
    }

    let decision = state
        .estimator
        .determine_api_source(req.user_id, req.price_list_id, Some(&req.courier_code))
        .await?;

    let estimate = state
        .estimator
        .calculate_provider_cost(
            &req.courier_code,
            req.weight,
            &req.zone_code,
            req.service_type.as_deref(),
            decision.master_price_list_id,
        )
        .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ProviderCostResponse {
        decision,
        estimate,
    })))
}

/// Configure provider cost routes
pub fn configure<S: Stores>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/provider-costs").route("/estimate", web::post().to(estimate::<S>)));
}
