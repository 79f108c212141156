// ⚙️ Configuration - TOML file + environment overrides
//
// Every section has defaults, so an absent file means "run with defaults".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RealtyError;
use crate::valuation::REFERENCE_YEAR;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const VALID_FORMATS: [&str; 2] = ["compact", "json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub valuation: ValuationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding users, courses, valuations and the kv table
    pub db_path: PathBuf,

    /// JSON file used by the CLI as its local key-value storage
    pub session_file: PathBuf,

    /// Storage key holding the serialized identity
    pub session_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Year used for the residential age adjustment
    pub reference_year: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            valuation: ValuationConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from("realty_insights.db"),
            session_file: PathBuf::from("session.json"),
            session_key: "user".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            reference_year: REFERENCE_YEAR,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise defaults; then env overrides + validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => AppConfig::from_file(p)?,
            _ => AppConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("REALTY_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(session_file) = std::env::var("REALTY_SESSION_FILE") {
            self.storage.session_file = PathBuf::from(session_file);
        }
        if let Ok(level) = std::env::var("REALTY_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(addr) = std::env::var("REALTY_SERVER_ADDR") {
            self.server.addr = addr;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        if !VALID_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(invalid(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                VALID_FORMATS.join(", ")
            )));
        }

        if self.storage.session_key.trim().is_empty() {
            return Err(invalid("storage.session_key cannot be empty".to_string()));
        }

        if self.server.addr.trim().is_empty() {
            return Err(invalid("server.addr cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> anyhow::Error {
    RealtyError::Config(message).into()
}
