//! Client configuration.
//!
//! Resolution order (lowest to highest priority):
//! 1. Built-in defaults
//! 2. Config file (explicit path, or `<config_dir>/drone-rpc/settings.json`)
//! 3. Environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Connection and adapter settings shared by every plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Timeout for establishing the channel (seconds).
    pub connect_timeout_secs: u64,
    /// Deadline for each unary call (seconds).
    pub request_timeout_secs: u64,
    /// HTTP/2 keep-alive ping interval (seconds).
    pub keep_alive_interval_secs: u64,
    /// Per-stream broadcast buffer; subscribers falling further behind skip
    /// items.
    pub stream_buffer: usize,
    /// Backoff for re-issuing streams after transport faults.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 50051,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            keep_alive_interval_secs: 30,
            stream_buffer: 64,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `host:port` with every other setting defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// The `http://host:port` URI the channel connects to.
    pub fn endpoint_uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the global file is optional.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(global) if global.exists() => load_config_file(&global)?,
            _ => ClientConfig::default(),
        },
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("drone-rpc").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `DRONE_RPC_*` overrides. Unparsable values are ignored.
fn apply_overrides(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("DRONE_RPC_HOST") {
        config.host = val;
    }
    if let Some(n) = lookup("DRONE_RPC_PORT").and_then(|v| v.parse().ok()) {
        config.port = n;
    }
    if let Some(n) = lookup("DRONE_RPC_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.request_timeout_secs = n;
    }
}
