//! Carrio Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Carrio rate resolution and wallet settlement engine. It includes:
//!
//! - Domain models (PriceList, WalletTransaction, ShipmentHold, etc.)
//! - VAT mode normalization and zone classification
//! - Store traits implemented by the database layer and the in-memory store
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod money;
pub mod traits;
pub mod vat;
pub mod zone;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
