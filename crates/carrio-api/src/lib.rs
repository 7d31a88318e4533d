//! API layer for Carrio
//!
//! HTTP handlers for rate quotes, price matrices, wallets, holds and
//! provider costs. Requests are authenticated upstream; handlers check
//! payload shape and map `AppError` to HTTP responses.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;
pub mod state;

// Re-export DTOs (common types)
pub use dto::ApiResponse;

pub use handlers::configure_routes;
pub use state::{AppState, PgStores, Stores};
