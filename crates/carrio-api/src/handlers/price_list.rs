//! Price list handlers
//!
//! Matrix building, metadata sync and lifecycle moves.

use crate::dto::{ApiResponse, MatrixRequest, StatusRequest};
use crate::state::{AppState, Stores};
use actix_web::{web, HttpResponse};
use carrio_core::models::PriceListStatus;
use carrio_core::AppError;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Build the price matrix of a list under a margin
///
/// POST /api/v1/price-lists/{id}/matrix
#[instrument(skip(state, req))]
pub async fn build_matrix<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<MatrixRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Matrix request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let matrix = state
        .matrix
        .build_matrix(
            path.into_inner(),
            req.margin_percent,
            req.vat_mode,
            req.vat_rate,
            req.options(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(matrix)))
}

/// Merge a metadata patch into a list
///
/// PATCH /api/v1/price-lists/{id}/metadata
#[instrument(skip(state, patch))]
pub async fn sync_metadata<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    patch: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let list = state
        .sync
        .sync_metadata(path.into_inner(), patch.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(list)))
}

/// Move a list to another lifecycle status
///
/// POST /api/v1/price-lists/{id}/status
#[instrument(skip(state, req))]
pub async fn transition_status<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<StatusRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let status = PriceListStatus::from_str(&req.status)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown status '{}'", req.status)))?;

    let list = state
        .sync
        .transition_status(path.into_inner(), status)
        .await?;

    info!(id = %list.id, status = %list.status, "Price list status changed");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        list,
        format!("Price list is now {}", status),
    )))
}

/// Configure price list routes
pub fn configure<S: Stores>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/price-lists")
            .route("/{id}/matrix", web::post().to(build_matrix::<S>))
            .route("/{id}/metadata", web::patch().to(sync_metadata::<S>))
            .route("/{id}/status", web::post().to(transition_status::<S>)),
    );
}
