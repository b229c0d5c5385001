// crates/forkwatch-daemon/src/config.rs
//
// Runtime configuration for the monitoring daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Network to monitor: "mainnet" or "testnet".
    #[serde(default = "default_network")]
    pub network: String,

    /// URL of the node's JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// RPC username.
    #[serde(default)]
    pub rpc_user: String,

    /// RPC password.
    #[serde(default)]
    pub rpc_pass: String,

    /// Seconds between best-block polls.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run against the built-in deterministic chain instead of a node.
    #[serde(default)]
    pub stub: bool,
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_rpc_url() -> String {
    "https://127.0.0.1:9109".to_string()
}

fn default_poll_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: default_rpc_url(),
            rpc_user: String::new(),
            rpc_pass: String::new(),
            poll_secs: default_poll_secs(),
            log_level: default_log_level(),
            stub: false,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
