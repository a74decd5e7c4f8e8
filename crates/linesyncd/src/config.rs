//! Daemon configuration: command line over config file over defaults

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 7380;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// One layer of settings; unset keys fall through to the next layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct PartialConfig {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub db: Option<PathBuf>,
    pub password: Option<String>,
}

impl PartialConfig {
    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Fill keys unset in `self` from `lower`
    pub fn or(self, lower: PartialConfig) -> PartialConfig {
        PartialConfig {
            port: self.port.or(lower.port),
            bind: self.bind.or(lower.bind),
            log_level: self.log_level.or(lower.log_level),
            db: self.db.or(lower.db),
            password: self.password.or(lower.password),
        }
    }
}

/// Fully resolved daemon settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub bind: String,
    pub log_level: String,
    pub db: Option<PathBuf>,
    pub password: Option<String>,
}

impl Settings {
    pub fn resolve(layers: PartialConfig) -> Self {
        Self {
            port: layers.port.unwrap_or(DEFAULT_PORT),
            bind: layers.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            log_level: layers.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            db: layers.db,
            password: layers.password,
        }
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.bind, self.port))
    }
}
