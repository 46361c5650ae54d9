use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; when absent the service runs on the
    /// in-memory stores (dev/test mode).
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Ledger protocol parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Credited as the first ledger entry when a wallet is opened.
    pub welcome_bonus: Decimal,
    /// Minimum amount per transfer.
    pub min_transfer: Decimal,
    /// Per-transfer cap assigned to new wallets.
    pub default_daily_limit: Decimal,
    /// OTP challenge time-to-live in seconds.
    pub otp_ttl_secs: i64,
    /// Failed code attempts before a challenge locks.
    pub otp_max_attempts: u8,
    /// Pending offer time-to-live in hours.
    pub pending_ttl_hours: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            welcome_bonus: Decimal::from(100),
            min_transfer: Decimal::from(3),
            default_daily_limit: Decimal::from(500),
            otp_ttl_secs: 300,
            otp_max_attempts: 3,
            pending_ttl_hours: 48,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
