//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Where the ledger and the checkpoints live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Process memory, lost on restart
    Memory,
    /// JSON snapshot files under the data directory
    Json,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Json => "json",
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "json" => Ok(Backend::Json),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Storage backend for ledger and checkpoints
    pub backend: Backend,
    /// Directory for `ledger.json` and `checkpoints.json`
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let backend = match lookup("SYNDEX_BACKEND") {
            Some(value) => value.parse()?,
            None => Backend::Memory,
        };

        let data_dir = lookup("SYNDEX_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        Ok(Self {
            host,
            port,
            backend,
            data_dir,
        })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    pub fn checkpoints_path(&self) -> PathBuf {
        self.data_dir.join("checkpoints.json")
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid SYNDEX_BACKEND value: {0} (expected memory or json)")]
    InvalidBackend(String),
}
