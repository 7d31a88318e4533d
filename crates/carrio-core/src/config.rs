//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub provider_cost: ProviderCostConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9001
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Wallet ledger retry policy
///
/// Only transient store conflicts are retried; the whole atomic
/// operation is re-run with exponential backoff.
#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// Total attempts including the first one
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay, in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_retry_attempts() -> u32 {
    4
}

fn default_initial_backoff() -> u64 {
    50
}

fn default_max_backoff() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl WalletConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Rate resolution settings
#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    /// Service type used by the matrix builder
    #[serde(default = "default_standard_service")]
    pub standard_service_type: String,

    /// Price-list metadata key holding the per-100kg extra step
    #[serde(default = "default_extra_step_key")]
    pub extra_step_metadata_key: String,
}

fn default_standard_service() -> String {
    "standard".to_string()
}

fn default_extra_step_key() -> String {
    "extra_step_per_100kg".to_string()
}

/// Provider cost estimation settings
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderCostConfig {
    /// Days of recorded costs considered for the historical average
    #[serde(default = "default_history_days")]
    pub history_window_days: i64,

    /// Minimum number of samples before the historical average is trusted
    #[serde(default = "default_min_samples")]
    pub min_history_samples: usize,

    /// Fixed part of the linear estimate
    #[serde(default = "default_linear_base")]
    pub linear_base: Decimal,

    /// Per-kg part of the linear estimate
    #[serde(default = "default_linear_per_kg")]
    pub linear_per_kg: Decimal,
}

fn default_history_days() -> i64 {
    30
}

fn default_min_samples() -> usize {
    10
}

fn default_linear_base() -> Decimal {
    Decimal::from(5)
}

fn default_linear_per_kg() -> Decimal {
    Decimal::new(50, 2)
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9001)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("wallet.max_attempts", 4)?
            .set_default("wallet.initial_backoff_ms", 50)?
            .set_default("wallet.max_backoff_ms", 1000)?
            .set_default("wallet.backoff_factor", 2.0)?
            .set_default("pricing.standard_service_type", "standard")?
            .set_default("pricing.extra_step_metadata_key", "extra_step_per_100kg")?
            .set_default("provider_cost.history_window_days", 30)?
            .set_default("provider_cost.min_history_samples", 10)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with CARRIO_ prefix
            .add_source(
                Environment::with_prefix("CARRIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CARRIO").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            standard_service_type: default_standard_service(),
            extra_step_metadata_key: default_extra_step_key(),
        }
    }
}

impl Default for ProviderCostConfig {
    fn default() -> Self {
        Self {
            history_window_days: default_history_days(),
            min_history_samples: default_min_samples(),
            linear_base: default_linear_base(),
            linear_per_kg: default_linear_per_kg(),
        }
    }
}
