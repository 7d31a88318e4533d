//! Domain models for Carrio
//!
//! This module contains all the core domain models used throughout the engine.

pub mod hold;
pub mod price_list;
pub mod provider_cost;
pub mod quote;
pub mod user;
pub mod wallet;

pub use hold::{
    ActionFee, Address, HoldActionResult, HoldActionType, HoldStatus, ShipmentHold,
    StorageSurchargeConfig,
};
pub use price_list::{
    PriceList, PriceListAssignment, PriceListEntry, PriceListStatus, PriceListType,
};
pub use provider_cost::{
    ApiSource, ApiSourceDecision, CostConfidence, CostSource, PlatformProviderCost,
    ProviderCostEstimate, ShipmentCostInput,
};
pub use quote::{DeliveryMode, MatrixOptions, MatrixRow, QuoteMatrix, RateQuote};
pub use user::{UserAccountType, UserProfile};
pub use wallet::{
    CreditCheck, LedgerApplyOutcome, LedgerMetadata, NewWalletTransaction, WalletAccount,
    WalletMovement, WalletTransaction, WalletTransactionType,
};
