use crate::config::{default_display_name, default_start_on_launch};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The external sync client to supervise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Name shown in the tray tooltip and notifications.
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Path to the sync client executable.
    pub program: PathBuf,

    /// Command-line arguments, in order.
    #[serde(default)]
    pub args: Vec<String>,

    /// Start the client as soon as the tray comes up.
    #[serde(default = "default_start_on_launch")]
    pub start_on_launch: bool,
}
