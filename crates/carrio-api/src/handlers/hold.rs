//! Hold (giacenza) handlers

use crate::dto::{ApiResponse, HoldActionRequest};
use crate::state::{AppState, Stores};
use actix_web::{web, HttpResponse};
use carrio_core::models::HoldActionType;
use carrio_core::AppError;
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Execute a billable action on a hold
///
/// POST /api/v1/holds/{id}/actions
#[instrument(skip(state, req))]
pub async fn execute_action<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<HoldActionRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Hold action validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let action = HoldActionType::from_str(&req.action)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown hold action '{}'", req.action)))?;

    let req = req.into_inner();
    let result = state
        .holds
        .execute_action(path.into_inner(), req.user_id, action, req.new_address)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        result,
        format!("Action {} confirmed", action),
    )))
}

/// Configure hold routes
pub fn configure<S: Stores>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/holds").route("/{id}/actions", web::post().to(execute_action::<S>)));
}
