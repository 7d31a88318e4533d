//! Shared application state
//!
//! Services are built once per process and shared by every worker through
//! `web::Data`. The store family is a type parameter so the same handlers
//! run on PostgreSQL in production and on the in-memory store in tests.

use carrio_core::config::{AppConfig, PricingConfig, ProviderCostConfig, WalletConfig};
use carrio_core::traits::{
    AssignmentRepository, HoldRepository, PriceListRepository, ProviderCostRepository,
    UserProfileRepository, WalletStore,
};
use carrio_db::{
    InMemoryStore, PgHoldRepository, PgPool, PgPriceListRepository, PgProviderCostRepository,
    PgUserProfileRepository, PgWalletStore,
};
use carrio_services::{
    HoldSettlement, MatrixBuilder, PriceListSync, ProviderCostEstimator, RateResolver,
    WalletLedger,
};
use std::sync::Arc;

/// A family of store implementations
pub trait Stores: 'static {
    type PriceLists: PriceListRepository + AssignmentRepository + 'static;
    type Users: UserProfileRepository + 'static;
    type Wallets: WalletStore + 'static;
    type Holds: HoldRepository + 'static;
    type Costs: ProviderCostRepository + 'static;
}

/// PostgreSQL repositories
pub struct PgStores;

impl Stores for PgStores {
    type PriceLists = PgPriceListRepository;
    type Users = PgUserProfileRepository;
    type Wallets = PgWalletStore;
    type Holds = PgHoldRepository;
    type Costs = PgProviderCostRepository;
}

impl Stores for InMemoryStore {
    type PriceLists = InMemoryStore;
    type Users = InMemoryStore;
    type Wallets = InMemoryStore;
    type Holds = InMemoryStore;
    type Costs = InMemoryStore;
}

/// Services shared by all handlers
pub struct AppState<S: Stores> {
    pub resolver: RateResolver<S::PriceLists>,
    pub matrix: MatrixBuilder<S::PriceLists>,
    pub sync: PriceListSync<S::PriceLists>,
    pub estimator: ProviderCostEstimator<S::PriceLists, S::Users, S::Costs>,
    pub ledger: Arc<WalletLedger<S::Wallets>>,
    pub holds: HoldSettlement<S::Holds, S::Wallets>,
}

impl<S: Stores> AppState<S> {
    /// Wire every service over the given stores
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        price_lists: Arc<S::PriceLists>,
        users: Arc<S::Users>,
        wallets: Arc<S::Wallets>,
        holds: Arc<S::Holds>,
        costs: Arc<S::Costs>,
        wallet: &WalletConfig,
        pricing: &PricingConfig,
        provider_cost: &ProviderCostConfig,
    ) -> Self {
        let ledger = Arc::new(WalletLedger::new(wallets, wallet));

        Self {
            resolver: RateResolver::new(price_lists.clone(), pricing.clone()),
            matrix: MatrixBuilder::new(price_lists.clone(), pricing.clone()),
            sync: PriceListSync::new(price_lists.clone()),
            estimator: ProviderCostEstimator::new(
                price_lists,
                users,
                costs,
                pricing.clone(),
                provider_cost.clone(),
            ),
            holds: HoldSettlement::new(holds, ledger.clone()),
            ledger,
        }
    }
}

impl AppState<PgStores> {
    /// State backed by one PostgreSQL pool
    pub fn postgres(pool: PgPool, config: &AppConfig) -> Self {
        Self::new(
            Arc::new(PgPriceListRepository::new(pool.clone())),
            Arc::new(PgUserProfileRepository::new(pool.clone())),
            Arc::new(PgWalletStore::new(pool.clone())),
            Arc::new(PgHoldRepository::new(pool.clone())),
            Arc::new(PgProviderCostRepository::new(pool)),
            &config.wallet,
            &config.pricing,
            &config.provider_cost,
        )
    }
}

impl AppState<InMemoryStore> {
    /// State backed by a single in-memory store with default settings
    pub fn in_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            &WalletConfig::default(),
            &PricingConfig::default(),
            &ProviderCostConfig::default(),
        )
    }
}
