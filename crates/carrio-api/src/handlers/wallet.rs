//! Wallet handlers
//!
//! HTTP handlers for balance lookups and ledger movements.

use crate::dto::{ApiResponse, CreditCheckQuery, MovementRequest, WalletResponse};
use crate::state::{AppState, Stores};
use actix_web::{web, HttpResponse};
use carrio_core::AppError;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Get the wallet of a user
///
/// GET /api/v1/wallets/{user_id}
#[instrument(skip(state))]
pub async fn get_wallet<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let wallet = state.ledger.balance(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(WalletResponse::from(wallet))))
}

/// Advisory credit pre-check
///
/// GET /api/v1/wallets/{user_id}/credit-check?amount=
#[instrument(skip(state))]
pub async fn credit_check<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    query: web::Query<CreditCheckQuery>,
) -> Result<HttpResponse, AppError> {
    let check = state
        .ledger
        .check_credit_before_booking(path.into_inner(), query.amount)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(check)))
}

/// Debit a wallet
///
/// POST /api/v1/wallets/{user_id}/debit
#[instrument(skip(state, req))]
pub async fn debit<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<MovementRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Debit validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let user_id = path.into_inner();
    debug!(%user_id, amount = %req.amount, key = %req.idempotency_key, "Debit requested");

    let movement = state
        .ledger
        .debit(user_id, req.amount, &req.idempotency_key, req.metadata())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(movement)))
}

/// Credit (top up) a wallet
///
/// POST /api/v1/wallets/{user_id}/credit
#[instrument(skip(state, req))]
pub async fn credit<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    req: web::Json<MovementRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Credit validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let movement = state
        .ledger
        .credit(path.into_inner(), req.amount, &req.idempotency_key, req.metadata())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(movement)))
}

/// Transaction list query
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Most recent ledger rows of a wallet
///
/// GET /api/v1/wallets/{user_id}/transactions
#[instrument(skip(state))]
pub async fn list_transactions<S: Stores>(
    state: web::Data<AppState<S>>,
    path: web::Path<Uuid>,
    query: web::Query<TransactionsQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.clamp(1, 500);
    let transactions = state.ledger.transactions(path.into_inner(), limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(transactions)))
}

/// Configure wallet routes
pub fn configure<S: Stores>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallets")
            .route("/{user_id}", web::get().to(get_wallet::<S>))
            .route("/{user_id}/credit-check", web::get().to(credit_check::<S>))
            .route("/{user_id}/debit", web::post().to(debit::<S>))
            .route("/{user_id}/credit", web::post().to(credit::<S>))
            .route("/{user_id}/transactions", web::get().to(list_transactions::<S>)),
    );
}
