// ⚙️ Settings - defaults, then `merit.toml`, then `MERIT__*` environment

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Minimum base score applied to queries that omit one
    #[serde(default = "default_min_score")]
    pub default_min_score: f64,

    #[serde(default = "default_true")]
    pub default_apply_regime: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: default_bind_addr(),
            port: default_port(),
            database_path: default_database_path(),
            log_level: default_log_level(),
            enable_cors: default_true(),
            default_min_score: default_min_score(),
            default_apply_regime: default_true(),
        }
    }
}

impl Settings {
    /// Load from the optional `merit.toml` file and `MERIT__` env vars
    pub fn load() -> Result<Self> {
        Self::load_from("merit")
    }

    pub fn load_from(file_stem: &str) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("MERIT").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if self.database_path.trim().is_empty() {
            bail!("database_path must not be empty");
        }
        if !(0.0..=100.0).contains(&self.default_min_score) {
            bail!("default_min_score must be within [0, 100]");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.bind_addr, self.port).parse()?)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_path() -> String {
    "merit.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_score() -> f64 {
    70.0
}

fn default_true() -> bool {
    true
}
