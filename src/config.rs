// src/config.rs - Configuration management
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};

use crate::reconciliation::DEFAULT_LOW_STOCK_THRESHOLD;

/// Value of `database.url` that selects the in-process row store.
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Threshold given to entries created implicitly by a first receipt
    pub default_low_stock_threshold: i64,
    /// Re-derive stock when a transaction's quantity or model is edited
    pub rebalance_on_edit: bool,
    /// 0 disables the periodic reload
    pub refresh_interval_seconds: u64,
    pub seed_demo_data: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:inventory.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: 30,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            rebalance_on_edit: false,
            refresh_interval_seconds: 0,
            seed_demo_data: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            ledger: LedgerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let file = env::var("CONFIG_FILE").ok();
    let mut config = load_config_file(file.as_deref().map(Path::new))?;

    override_with_env(&mut config, |key| env::var(key).ok())?;

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

pub fn load_config_file(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let config_str = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Applies environment overrides; `lookup` is `std::env::var` outside tests.
pub fn override_with_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(max_conn_str) = lookup("DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = max_conn_str
            .parse()
            .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {}", max_conn_str))?;
    }
    if let Some(min_conn_str) = lookup("DATABASE_MIN_CONNECTIONS") {
        config.database.min_connections = min_conn_str
            .parse()
            .with_context(|| format!("DATABASE_MIN_CONNECTIONS is not a number: {}", min_conn_str))?;
    }
    if let Some(threshold_str) = lookup("LOW_STOCK_THRESHOLD") {
        config.ledger.default_low_stock_threshold = threshold_str
            .parse()
            .with_context(|| format!("LOW_STOCK_THRESHOLD is not a number: {}", threshold_str))?;
    }
    if let Some(flag) = lookup("LEDGER_REBALANCE_ON_EDIT") {
        if let Some(value) = parse_flag(&flag) {
            config.ledger.rebalance_on_edit = value;
        }
    }
    if let Some(interval_str) = lookup("LEDGER_REFRESH_INTERVAL_SECONDS") {
        if let Ok(interval) = interval_str.parse::<u64>() {
            config.ledger.refresh_interval_seconds = interval;
        }
    }
    if let Some(flag) = lookup("LEDGER_SEED_DEMO_DATA") {
        if let Some(value) = parse_flag(&flag) {
            config.ledger.seed_demo_data = value;
        }
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }

    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(anyhow::anyhow!("database.url must not be empty"));
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if self.ledger.default_low_stock_threshold < 0 {
            return Err(anyhow::anyhow!(
                "default_low_stock_threshold must be >= 0 (current: {})",
                self.ledger.default_low_stock_threshold
            ));
        }

        Ok(())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database.url.trim() == MEMORY_DATABASE_URL
    }

    pub fn print_startup_info(&self) {
        log::info!("🖨️ Inventory ledger starting up...");
        log::info!("💾 Store: {}",
            if self.uses_memory_store() { "in-memory (nothing is persisted)" }
            else if self.database.url.contains("sqlite") { "SQLite" }
            else { "Unknown" });
        log::info!("📉 Default low-stock threshold: {}", self.ledger.default_low_stock_threshold);
        log::info!("✏️ Rebalance on edit: {}", if self.ledger.rebalance_on_edit { "Enabled" } else { "Disabled" });
        if self.ledger.refresh_interval_seconds > 0 {
            log::info!("🔄 Reload every {}s", self.ledger.refresh_interval_seconds);
        }
        log::info!("📊 Logging: {} level", self.logging.level);
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}
