//! # Dipamkara — Server configuration
//!
//! Loaded from a YAML file with uppercase keys:
//!
//! ```yaml
//! DIMENSION: 1024        # required — vector dimension
//! DB_PATH: /data/db      # required — persistence root
//! DB_ENGINE: dipamkara   # only supported engine
//! CACHED: false          # load every document into memory at startup
//! HOST: 0.0.0.0
//! PORT: 23860
//! EOF: "<eof>"           # frame terminator
//! TIMEOUT: 4.0           # per-read timeout, seconds
//! BUFFER_SIZE: 256       # read chunk size, bytes
//! VERBOSE: false
//! ```

use crate::protocol::{DEFAULT_EOF, ENGINE_NAME};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ServerConfig {
    /// Vector dimension; every stored and queried vector must match.
    pub dimension: usize,
    /// Root directory for the on-disk archive.
    pub db_path: PathBuf,
    #[serde(default = "default_engine")]
    pub db_engine: String,
    #[serde(default)]
    pub cached: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_eof")]
    pub eof: String,
    /// Per-read timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Read chunk size in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub verbose: bool,
}

fn default_engine() -> String {
    ENGINE_NAME.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    23860
}

fn default_eof() -> String {
    DEFAULT_EOF.to_string()
}

fn default_timeout() -> f64 {
    4.0
}

fn default_buffer_size() -> usize {
    256
}

impl ServerConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("cannot parse config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        ensure!(config.dimension > 0, "DIMENSION must be positive");
        ensure!(!config.eof.is_empty(), "EOF must not be empty");
        ensure!(config.buffer_size > 0, "BUFFER_SIZE must be positive");
        ensure!(
            config.timeout.is_finite() && config.timeout > 0.0,
            "TIMEOUT must be positive"
        );
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn eof_bytes(&self) -> Vec<u8> {
        self.eof.clone().into_bytes()
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
