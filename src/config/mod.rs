//! # Configuration
//!
//! The server reads one TOML file. Every section except `[server]` and
//! `[storage]` has defaults, so a minimal file only needs to say where to
//! listen and where to keep data.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//! allowed_origins = ["*"]
//!
//! [storage]
//! data_dir = "./data"
//!
//! [economy]
//! starting_cash = 100.0
//! ```
//!
//! ```rust,no_run
//! use shadow_empire::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("listening on {}", config.server.bind);
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::game::tuning::EconomyTuning;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Optional JSON catalog (file or directory); the built-in content is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub economy: EconomyTuning,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub ton: TonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    /// CORS origins; `"*"` allows any.
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
    /// Seconds between maintenance passes (war finalization, heist expiry).
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,
    /// Secret for `/api/admin/*`; the admin routes refuse everything when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
}

fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_maintenance_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Defaults to `<data_dir>/../backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    /// Hours between automatic backups; 0 disables them.
    #[serde(default = "default_backup_interval")]
    pub backup_interval_hours: u64,
    /// Automatic backups kept; manual backups are never pruned.
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,
}

fn default_backup_interval() -> u64 {
    24
}

fn default_backup_retention() -> usize {
    7
}

impl StorageConfig {
    /// Directory holding the game database.
    pub fn game_db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("game")
    }

    pub fn backup_path(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.data_dir)
                .parent()
                .map(|p| p.join("backups"))
                .unwrap_or_else(|| PathBuf::from("backups")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Separate copy of `security` target lines (rejected initData, webhook secrets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            security_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    /// Bot token used to create Stars invoice links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Numeric bot id used in the init_data signature check.
    #[serde(default)]
    pub bot_id: i64,
    /// Reject requests that arrive without a signed `init_data`.
    #[serde(default)]
    pub require_init_data: bool,
    /// Shared secret the bot presents when confirming Stars payments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TonConfig {
    /// Receiving wallet shown to players.
    pub wallet_address: String,
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Fraction of the expected amount a transfer must carry.
    pub amount_tolerance: f64,
    /// Recent wallet transactions scanned per verification.
    pub scan_limit: u32,
}

impl Default for TonConfig {
    fn default() -> Self {
        Self {
            wallet_address: String::new(),
            api_url: "https://toncenter.com/api/v2".to_string(),
            api_key: None,
            amount_tolerance: 0.95,
            scan_limit: 20,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.server.maintenance_interval_secs == 0 {
            return Err(anyhow!("server.maintenance_interval_secs must be positive"));
        }
        let e = &self.economy;
        if e.starting_cash < 0.0 || e.prestige_starting_cash < 0.0 {
            return Err(anyhow!("economy starting cash must be non-negative"));
        }
        if !(0.0..1.0).contains(&e.market_commission) || !(0.0..1.0).contains(&e.vip_market_commission) {
            return Err(anyhow!("economy market commissions must be in [0, 1)"));
        }
        if !(0.0 < e.combat_min_chance && e.combat_min_chance <= 0.5 && e.combat_max_chance < 1.0) {
            return Err(anyhow!("economy combat clamps must satisfy 0 < min <= 0.5 and max < 1"));
        }
        if e.raid_threshold <= 0.0 || e.raid_threshold > 100.0 {
            return Err(anyhow!("economy.raid_threshold must be in (0, 100]"));
        }
        if e.gang_max_members == 0 {
            return Err(anyhow!("economy.gang_max_members must be positive"));
        }
        if !(0.0 < self.ton.amount_tolerance && self.ton.amount_tolerance <= 1.0) {
            return Err(anyhow!("ton.amount_tolerance must be in (0, 1]"));
        }
        if self.telegram.require_init_data && self.telegram.bot_id == 0 {
            return Err(anyhow!("telegram.bot_id is required when require_init_data is set"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| anyhow!("Invalid server.bind '{}': {}", self.server.bind, e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind: "0.0.0.0:8000".to_string(),
                allowed_origins: default_origins(),
                maintenance_interval_secs: default_maintenance_interval(),
                admin_secret: None,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                backup_dir: None,
                backup_interval_hours: default_backup_interval(),
                backup_retention: default_backup_retention(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("shadow-empire.log".to_string()),
                security_file: None,
            },
            economy: EconomyTuning::default(),
            telegram: TelegramConfig::default(),
            ton: TonConfig::default(),
            content_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn default_config_survives_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.server.bind, "0.0.0.0:8000");
        assert_eq!(back.storage.backup_interval_hours, 24);
        assert_eq!(back.ton.amount_tolerance, 0.95);
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [storage]
            data_dir = "/tmp/se"

            [economy]
            starting_cash = 250.0
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.economy.starting_cash, 250.0);
        assert_eq!(config.server.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.storage.backup_retention, 7);
        assert!(!config.telegram.require_init_data);
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let mut config = Config::default();
        config.server.bind = "not an address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn signature_check_needs_bot_id() {
        let mut config = Config::default();
        config.telegram.require_init_data = true;
        assert!(config.validate().is_err());
        config.telegram.bot_id = 12345;
        config.validate().unwrap();
    }

    #[test]
    fn backup_dir_defaults_next_to_data() {
        let config = Config::default();
        assert_eq!(config.storage.backup_path(), PathBuf::from("./backups"));
        assert_eq!(config.storage.game_db_path(), PathBuf::from("./data/game"));
    }

    #[test]
    fn create_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        tokio_test::block_on(Config::create_default(path)).unwrap();
        let loaded = tokio_test::block_on(Config::load(path)).unwrap();
        assert_eq!(loaded.server.bind, Config::default().server.bind);
        assert!(tokio_test::block_on(Config::load("/nonexistent/config.toml")).is_err());
    }
}
