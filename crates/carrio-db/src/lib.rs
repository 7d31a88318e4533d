//! Carrio Database Layer
//!
//! This crate provides PostgreSQL database access and repository implementations
//! for the Carrio engine. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for price lists, wallets, holds and provider costs
//! - Atomic, idempotent wallet movements in a single transaction
//! - An in-memory store implementing the same traits, for tests and local runs

pub mod error;
pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::InMemoryStore;
pub use pool::{create_pool, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use carrio_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
