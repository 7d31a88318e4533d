//! Business logic services for Carrio
//!
//! This crate contains the services that resolve shipping rates, build
//! commercial matrices, estimate provider costs and settle money against
//! prepaid wallets.
//!
//! # Architecture
//!
//! Services are generic over the store traits of `carrio-core`:
//! - Each service owns `Arc` handles to its stores
//! - Production wires the PostgreSQL repositories, tests the in-memory store
//! - All operations are instrumented with tracing
//! - Balances only move through `WalletLedger`
//!
//! # Services
//!
//! - `RateResolver` - Tier selection and VAT-aware quoting
//! - `MatrixBuilder` - Zone x weight price matrices under a margin
//! - `ProviderCostEstimator` - Contract attribution and provider cost fallback chain
//! - `WalletLedger` - Idempotent, retried debits and credits
//! - `HoldSettlement` - Paid actions on shipment holds
//! - `PriceListSync` - Metadata merge and lifecycle moves

pub mod hold_settlement;
pub mod matrix_builder;
pub mod price_list_sync;
pub mod provider_cost;
pub mod rate_resolver;
pub mod retry;
pub mod wallet_ledger;

pub use hold_settlement::HoldSettlement;
pub use matrix_builder::MatrixBuilder;
pub use price_list_sync::{merge_metadata, PriceListSync};
pub use provider_cost::ProviderCostEstimator;
pub use rate_resolver::RateResolver;
pub use retry::{with_retry, RetryConfig};
pub use wallet_ledger::WalletLedger;
