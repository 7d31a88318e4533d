//! HTTP request handlers

pub mod health;
pub mod hold;
pub mod price_list;
pub mod provider_cost;
pub mod rate;
pub mod wallet;

use crate::state::Stores;
use actix_web::web;

pub use health::health_check;
pub use hold::configure as configure_holds;
pub use price_list::configure as configure_price_lists;
pub use provider_cost::configure as configure_provider_costs;
pub use rate::configure as configure_rates;
pub use wallet::configure as configure_wallets;

/// Configure the `/api/v1` scope
pub fn configure_routes<S: Stores>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .configure(configure_rates::<S>)
            .configure(configure_price_lists::<S>)
            .configure(configure_wallets::<S>)
            .configure(configure_holds::<S>)
            .configure(configure_provider_costs::<S>),
    );
}
