//! Configuration types

use crate::control::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SOCKET_PATH, MAX_COMMAND_LEN};
use crate::telemetry::LogConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Daemon configuration (fwall.toml). Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Path of the control socket
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Longest accepted command line in bytes
    #[serde(default = "default_max_command_len")]
    pub max_command_len: usize,
    /// Seconds a session may sit idle before it is closed
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_command_len: default_max_command_len(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_max_command_len() -> usize {
    MAX_COMMAND_LEN
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Interface to tap; no tap runs when unset
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Maximum number of rules; unbounded when unset
    pub max_rules: Option<usize>,
    /// Rule lines installed at startup, in order
    #[serde(default)]
    pub rules: Vec<String>,
}
