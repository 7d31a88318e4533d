//! Repository implementations
//!
//! This module contains PostgreSQL implementations of the store traits
//! defined in `carrio-core`.

pub mod hold_repo;
pub mod price_list_repo;
pub mod provider_cost_repo;
pub mod user_repo;
pub mod wallet_repo;

pub use hold_repo::PgHoldRepository;
pub use price_list_repo::PgPriceListRepository;
pub use provider_cost_repo::PgProviderCostRepository;
pub use user_repo::PgUserProfileRepository;
pub use wallet_repo::PgWalletStore;
