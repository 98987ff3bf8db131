use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::proto::DEFAULT_MAX_PAYLOAD;
use crate::state::RelaySettings;

const DEFAULT_CONFIG_PATH: &str = "./lanchat.toml";

/// Command-line flags. Every setting is optional here so that an unset
/// flag never masks the TOML file or the environment.
#[derive(Parser, Serialize, Deserialize, Clone, Debug, Default)]
#[command(name = "lanchat-server", version, about = "LAN text/avatar chat relay")]
pub struct CliArgs {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Liveness check interval in milliseconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_interval_ms: Option<u64>,

    /// Seconds a new connection may take to send its handshake
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake_timeout_secs: Option<u64>,

    /// Largest accepted frame payload in bytes
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<usize>,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,
}

impl CliArgs {
    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH)
    }
}

/// Effective server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub monitor_interval_ms: u64,
    pub handshake_timeout_secs: u64,
    pub max_payload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 13000,
            bind_address: "127.0.0.1".to_string(),
            json_logs: false,
            monitor_interval_ms: 1000,
            handshake_timeout_secs: 30,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (LANCHAT_*) < CLI args
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(cli.config_path()))
            .merge(Env::prefixed("LANCHAT_"))
            .merge(Serialized::defaults(cli))
            .extract()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddress {
                address: self.bind_address.clone(),
                source,
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            monitor_interval: Duration::from_millis(self.monitor_interval_ms.max(1)),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs.max(1)),
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# LAN chat relay configuration
# Place this file at ./lanchat.toml or specify with --config <path>
# All settings can be overridden via environment variables (LANCHAT_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 13000)
# port = 13000

# Bind address (default: 127.0.0.1, loopback only)
# bind_address = "127.0.0.1"

# Enable structured JSON logging
# json_logs = false

# How often each connection is checked for a silently closed peer, in ms
# monitor_interval_ms = 1000

# Seconds a new connection may take to send its handshake
# handshake_timeout_secs = 30

# Largest accepted frame payload in bytes (default: 8 MiB)
# max_payload_bytes = 8388608
"#
    .to_string()
}
