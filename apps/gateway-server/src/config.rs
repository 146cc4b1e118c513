//! Server configuration.
//!
//! A single JSON file holding the device connection fields plus optional
//! gateway settings:
//!
//! ```json
//! {
//!   "ip_address": "192.168.0.90",
//!   "username": "root",
//!   "password": "pass",
//!   "target_id": "",
//!   "listen_addr": "0.0.0.0:9090",
//!   "static_dir": "static",
//!   "token_mode": "cached",
//!   "accept_invalid_device_certs": true,
//!   "signaling_port": 8082
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use bodyworn_gateway::TokenMode;
use bodyworn_protocol::DeviceConfig;
use bodyworn_protocol::constants::DEFAULT_SIGNALING_PORT;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable overriding the config path.
pub const CONFIG_ENV: &str = "BODYWORN_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub device: DeviceConfig,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    #[serde(default)]
    pub token_mode: TokenMode,

    /// Skip certificate validation toward the device (self-signed certs).
    #[serde(default = "default_true")]
    pub accept_invalid_device_certs: bool,

    #[serde(default = "default_signaling_port")]
    pub signaling_port: u16,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_true() -> bool {
    true
}

fn default_signaling_port() -> u16 {
    DEFAULT_SIGNALING_PORT
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        anyhow::ensure!(
            !config.device.address.trim().is_empty(),
            "{}: ip_address is empty",
            path.display()
        );
        Ok(config)
    }
}

/// Config path: first CLI argument, then `BODYWORN_CONFIG`, then `config.json`.
pub fn resolve_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    let non_empty = |p: &String| !p.is_empty();
    arg.filter(non_empty)
        .or(env.filter(non_empty))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
