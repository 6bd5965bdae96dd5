//! Runtime configuration shared across the forge workspace.
//!
//! [`Config`] centralises every tunable named in SPEC_FULL.md §6.5: node
//! topology, PoW difficulty, gateway/app-server endpoints, the socket and
//! worker timeouts from §5, and the ambient storage paths from §4.8. It is
//! constructed via the fluent [`ConfigBuilder`] (same pattern as the teacher's
//! `core::config::ConfigBuilder`) or loaded from a TOML file with
//! [`Config::from_toml_str`]/[`Config::load`].
//!
//! ```
//! use forge_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.difficulty, 2);
//! assert_eq!(cfg.node_ports, vec![13245, 13246, 13247]);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Ordered set of node listen ports, fixed at launch.
    pub node_ports: Vec<u16>,
    /// PoW leading-zero hex-char difficulty.
    pub difficulty: u32,

    pub node_host: String,
    pub gateway_host: String,
    pub gateway_port: u16,

    pub appserver_confirm_host: String,
    pub appserver_confirm_port: u16,
    pub appserver_tls_host: String,
    pub appserver_tls_port: u16,

    /// Gateway's per-peer connect-send-close timeout (§5), in seconds.
    pub peer_socket_timeout_secs: u64,
    /// Submission worker's synchronous gateway-call timeout (§5), in seconds.
    pub submission_timeout_secs: u64,
    /// End-to-end purchase deadline before the status flips to `timeout` (§5).
    pub purchase_timeout_secs: u64,
    /// Timeout monitor polling interval (§4.6), in seconds.
    pub timeout_monitor_interval_secs: u64,

    pub ledger_dir: String,
    pub key_dir: String,
    pub wallet_db_path: String,
    pub gateway_db_path: String,

    /// Default `tracing-subscriber` env-filter directive when `RUST_LOG` is unset.
    pub tracing_default_filter: String,
}

impl Default for Config {
    /// The single-machine three-node development topology used throughout the
    /// test suite and the §8 end-to-end scenarios.
    fn default() -> Self {
        Self {
            node_ports: vec![13245, 13246, 13247],
            difficulty: 2,
            node_host: "127.0.0.1".into(),
            gateway_host: "127.0.0.1".into(),
            gateway_port: 13249,
            appserver_confirm_host: "127.0.0.1".into(),
            appserver_confirm_port: 13290,
            appserver_tls_host: "127.0.0.1".into(),
            appserver_tls_port: 13200,
            peer_socket_timeout_secs: 3,
            submission_timeout_secs: 10,
            purchase_timeout_secs: 600,
            timeout_monitor_interval_secs: 5,
            ledger_dir: "data/ledger".into(),
            key_dir: "data/keys".into(),
            wallet_db_path: "data/wallet.db".into(),
            gateway_db_path: "data/gateway.db".into(),
            tracing_default_filter: "info".into(),
        }
    }
}

impl Config {
    pub fn peer_socket_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_socket_timeout_secs)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout_secs)
    }

    pub fn timeout_monitor_interval(&self) -> Duration {
        Duration::from_secs(self.timeout_monitor_interval_secs)
    }

    /// Parses a TOML document into a `Config`, falling back to
    /// [`Config::default`] for any field the document omits.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from `path`, or returns [`Config::default`] if the
    /// file does not exist (an operator running the bundled dev topology needs
    /// no config file at all).
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Fluent builder for [`Config`], mirroring the teacher's `ConfigBuilder`.
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    pub fn node_ports(mut self, ports: Vec<u16>) -> Self {
        self.inner.node_ports = ports;
        self
    }

    pub fn difficulty(mut self, difficulty: u32) -> Self {
        self.inner.difficulty = difficulty;
        self
    }

    pub fn gateway(mut self, host: impl Into<String>, port: u16) -> Self {
        self.inner.gateway_host = host.into();
        self.inner.gateway_port = port;
        self
    }

    pub fn appserver_confirm(mut self, host: impl Into<String>, port: u16) -> Self {
        self.inner.appserver_confirm_host = host.into();
        self.inner.appserver_confirm_port = port;
        self
    }

    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .difficulty(4)
            .node_ports(vec![1, 2])
            .gateway("0.0.0.0", 9000)
            .finish();
        assert_eq!(cfg.difficulty, 4);
        assert_eq!(cfg.node_ports, vec![1, 2]);
        assert_eq!(cfg.gateway_port, 9000);
    }

    #[test]
    fn missing_fields_fall_back_to_default() {
        let cfg = Config::from_toml_str("difficulty = 5\n").unwrap();
        assert_eq!(cfg.difficulty, 5);
        assert_eq!(cfg.node_ports, Config::default().node_ports);
    }

    #[test]
    fn load_nonexistent_path_returns_default() {
        let cfg = Config::load(Path::new("/nonexistent/forge.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
