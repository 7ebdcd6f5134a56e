use crate::config::{
    DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_KILL_TIMEOUT_MS, DEFAULT_TERMINATE_TIMEOUT_MS,
    default_drain_timeout_ms, default_kill_timeout_ms, default_terminate_timeout_ms,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sync_tray_core::SupervisorConfig;

/// Supervisor timeouts, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Grace period after the stop request before force killing.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,

    /// How long to wait after a force kill.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    /// How long to wait for output to drain after the client exits.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            terminate_timeout_ms: DEFAULT_TERMINATE_TIMEOUT_MS,
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

impl SupervisorSettings {
    /// Convert to the core supervisor configuration.
    pub fn to_supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            terminate_timeout: Duration::from_millis(self.terminate_timeout_ms),
            kill_timeout: Duration::from_millis(self.kill_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            ..SupervisorConfig::default()
        }
    }
}
