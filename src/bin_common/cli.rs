//! CLI utilities for binaries
//!
//! Handles environment-driven settings for the listener binary.

use anyhow::{Context, Result};
use std::time::Duration;

/// Default handshake endpoint
pub const DEFAULT_URL: &str = "http://localhost:4500/socket.io/1";

/// Default time the listener stays connected
pub const DEFAULT_RUN_SECS: u64 = 10;

/// Setting read from the environment
#[derive(Debug, Clone)]
pub enum Setting {
    /// Handshake endpoint (SOCKETIO_URL)
    Url,
    /// Seconds to stay connected (SOCKETIO_RUN_SECS)
    RunSecs,
    /// Event emitted with an ack right after connecting (SOCKETIO_ACK_EVENT)
    AckEvent,
}

impl Setting {
    /// Get the default value for this setting
    pub fn default_value(&self) -> Option<String> {
        match self {
            Setting::Url => Some(DEFAULT_URL.to_string()),
            Setting::RunSecs => Some(DEFAULT_RUN_SECS.to_string()),
            Setting::AckEvent => None,
        }
    }

    /// Get the environment variable name for this setting
    pub fn env_var_name(&self) -> &str {
        match self {
            Setting::Url => "SOCKETIO_URL",
            Setting::RunSecs => "SOCKETIO_RUN_SECS",
            Setting::AckEvent => "SOCKETIO_ACK_EVENT",
        }
    }
}

/// Load a setting from the environment, falling back to its default
///
/// Empty values count as unset.
pub fn load_setting_from_env(setting: Setting) -> Option<String> {
    std::env::var(setting.env_var_name())
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| setting.default_value())
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Everything `socketio_listen` needs to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    pub url: String,
    pub run_for: Duration,
    /// Events to log (positional arguments)
    pub events: Vec<String>,
    pub ack_event: Option<String>,
}

impl ListenConfig {
    /// Build from the environment plus positional event names
    pub fn from_env(events: Vec<String>) -> Result<Self> {
        let url = load_setting_from_env(Setting::Url).unwrap_or_else(|| DEFAULT_URL.to_string());
        let run_secs = match load_setting_from_env(Setting::RunSecs) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("SOCKETIO_RUN_SECS must be a whole number, got {:?}", raw))?,
            None => DEFAULT_RUN_SECS,
        };

        Ok(Self {
            url,
            run_for: Duration::from_secs(run_secs),
            events,
            ack_event: load_setting_from_env(Setting::AckEvent),
        })
    }
}
