//! Health check handler

use crate::dto::HealthResponse;
use actix_web::HttpResponse;

/// Health check endpoint
///
/// GET /api/v1/health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "carrio-billing".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
