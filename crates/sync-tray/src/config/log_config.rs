use crate::config::{DEFAULT_LOG_FILE_NAME, default_log_file_name};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where captured client output is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log directory (None = platform data directory).
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// File name inside the log directory.
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: DEFAULT_LOG_FILE_NAME.to_string(),
        }
    }
}
