#[allow(clippy::module_inception)]
mod config;
mod log_config;
mod notification_config;
mod supervisor_settings;
mod sync_config;

pub(crate) use {
    config::Config, log_config::LogConfig, notification_config::NotificationConfig,
    supervisor_settings::SupervisorSettings, sync_config::SyncConfig,
};

pub(crate) const DEFAULT_DISPLAY_NAME: &str = "OneDrive";
pub(crate) const DEFAULT_PROGRAM: &str = "/usr/local/bin/onedrive";
pub(crate) const DEFAULT_START_ON_LAUNCH: bool = true;
pub(crate) const DEFAULT_TERMINATE_TIMEOUT_MS: u64 = 10_000;
pub(crate) const DEFAULT_KILL_TIMEOUT_MS: u64 = 5_000;
pub(crate) const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 2_000;
pub(crate) const DEFAULT_LOG_FILE_NAME: &str = "sync.log";
pub(crate) const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 15;

/// Flags the onedrive client runs with, followed by `--confdir <dir>`.
pub(crate) const DEFAULT_SYNC_FLAGS: [&str; 3] = ["--monitor", "--local-first", "--skip-symlinks"];

pub(crate) fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

pub(crate) fn default_start_on_launch() -> bool {
    DEFAULT_START_ON_LAUNCH
}

pub(crate) fn default_terminate_timeout_ms() -> u64 {
    DEFAULT_TERMINATE_TIMEOUT_MS
}

pub(crate) fn default_kill_timeout_ms() -> u64 {
    DEFAULT_KILL_TIMEOUT_MS
}

pub(crate) fn default_drain_timeout_ms() -> u64 {
    DEFAULT_DRAIN_TIMEOUT_MS
}

pub(crate) fn default_log_file_name() -> String {
    DEFAULT_LOG_FILE_NAME.to_string()
}

pub(crate) fn default_notification_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}
