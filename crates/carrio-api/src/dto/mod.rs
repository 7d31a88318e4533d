//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod hold;
pub mod price_list;
pub mod provider_cost;
pub mod rate;
pub mod wallet;

pub use common::*;
pub use hold::*;
pub use price_list::*;
pub use provider_cost::*;
pub use rate::*;
pub use wallet::*;
