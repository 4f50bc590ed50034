use config::{Config, ConfigError};
use dotenv::dotenv;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default)]
    pub in_memory: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub guest_access_ttl_secs: i64,
    pub guest_refresh_ttl_secs: i64,
}

/// How the table is encoded in the bank transfer content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// `SEVQR<number>BHT<token>` embedded in the transfer content.
    Composite,
    /// `TAB<number>` in the gateway `code` field or the content.
    Prefixed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSettings {
    pub api_key: String,
    pub reference_mode: ReferenceMode,
    #[serde(default = "default_reject_unmatched")]
    pub reject_unmatched_orders: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerSettings {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    pub interval_secs: u64,
    pub stale_guest_retention_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub payment: PaymentSettings,
    pub owner: OwnerSettings,
    pub sweep: SweepSettings,
}

fn default_max_connections() -> usize {
    10
}

fn default_transaction_timeout_ms() -> u64 {
    5_000
}

fn default_reject_unmatched() -> bool {
    true
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();
        let mut s = Config::default();
        s.merge(config::File::with_name("config"))?;
        s.merge(config::Environment::with_prefix("APP").separator("__"))?;
        s.try_into()
    }
}
