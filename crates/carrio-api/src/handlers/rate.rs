//! Rate quote handlers

use crate::dto::{ApiResponse, QuoteRequest};
use crate::state::{AppState, Stores};
use actix_web::{web, HttpResponse};
use carrio_core::zone::Destination;
use carrio_core::AppError;
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Quote one shipment
///
/// POST /api/v1/rates/quote
#[instrument(skip(state, req))]
pub async fn quote<S: Stores>(
    state: web::Data<AppState<S>>,
    req: web::Json<QuoteRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Quote request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let destination = Destination::from(&req.destination);
    let service_type = req.service_type.as_deref();
    debug!(weight = %req.weight, zone = %destination.zone(), "Quoting shipment");

    let quote = match (req.price_list_id, req.user_id) {
        (Some(price_list_id), _) => {
            state
                .resolver
                .quote(price_list_id, req.weight, &destination, service_type)
                .await?
        }
        (None, Some(user_id)) => {
            state
                .resolver
                .quote_for_user(user_id, req.weight, &destination, service_type, None)
                .await?
        }
        (None, None) => {
            return Err(AppError::MissingField(
                "price_list_id or user_id".to_string(),
            ))
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(quote)))
}

/// Configure rate routes
pub fn configure<S: Stores>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/rates").route("/quote", web::post().to(quote::<S>)));
}
