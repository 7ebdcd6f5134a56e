//! Configuration management for sync-tray.
//!
//! Handles loading and saving TOML configuration files with cross-platform
//! paths and atomic write operations.

use crate::{
    AppError, AppResult,
    config::{
        DEFAULT_DISPLAY_NAME, DEFAULT_PROGRAM, DEFAULT_START_ON_LAUNCH, DEFAULT_SYNC_FLAGS,
        LogConfig, NotificationConfig, SupervisorSettings, SyncConfig,
    },
};

use std::{
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::{BaseDirs, ProjectDirs};
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use sync_tray_core::LaunchSpec;
use tracing::{debug, info, instrument, warn};

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The sync client to supervise.
    pub sync: SyncConfig,
    /// Supervisor timeouts.
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    /// Captured output log.
    #[serde(default)]
    pub log: LogConfig,
    /// Desktop notifications.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load configuration from disk, creating default if not found.
    ///
    /// The program path is NOT checked here. A missing client surfaces as a
    /// launch failure in the log and a notification, so the tray still
    /// comes up and can be restarted once the client is installed.
    #[track_caller]
    #[instrument]
    pub fn load() -> AppResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).map_err(|e| AppError::ConfigError {
                reason: format!("Failed to read config: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

            let config = Self::parse(&contents)?;

            info!(config_path = ?config_path, "Configuration loaded");

            Ok(config)
        } else {
            info!("No config found, creating default");
            Self::create_default()
        }
    }

    /// Parse configuration from TOML text.
    #[track_caller]
    pub fn parse(contents: &str) -> AppResult<Self> {
        toml::from_str(contents).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Configuration matching the stock onedrive monitor invocation.
    ///
    /// `onedrive_confdir` is passed as `--confdir`.
    pub fn with_defaults(onedrive_confdir: &Path) -> Self {
        let mut args: Vec<String> = DEFAULT_SYNC_FLAGS.iter().map(|s| s.to_string()).collect();
        args.push("--confdir".to_string());
        args.push(onedrive_confdir.display().to_string());

        Config {
            sync: SyncConfig {
                display_name: DEFAULT_DISPLAY_NAME.to_string(),
                program: PathBuf::from(DEFAULT_PROGRAM),
                args,
                start_on_launch: DEFAULT_START_ON_LAUNCH,
            },
            supervisor: SupervisorSettings::default(),
            log: LogConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }

    /// Save configuration to disk using atomic write pattern.
    ///
    /// Writes to a temporary file first, then renames to prevent corruption
    /// if the process crashes during the write.
    #[track_caller]
    #[instrument]
    pub fn save(&self) -> AppResult<()> {
        let config_path = Self::config_path()?;

        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        // Atomic write: write to temp file then rename
        let temp_path = config_path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, &config_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?config_path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// Program and arguments for the supervisor.
    pub fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec::new(self.sync.program.clone(), self.sync.args.clone())
    }

    /// How long desktop notifications stay visible.
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notifications.timeout_secs)
    }

    /// Directory the captured output log lives in.
    #[track_caller]
    pub fn log_directory(&self) -> AppResult<PathBuf> {
        match &self.log.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("logs")),
        }
    }

    #[track_caller]
    fn project_dirs() -> AppResult<ProjectDirs> {
        ProjectDirs::from("com", "sync-tray", "Sync-Tray").ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get project directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Path of `config.toml`, creating its directory if needed.
    #[track_caller]
    pub fn config_path() -> AppResult<PathBuf> {
        let proj_dirs = Self::project_dirs()?;
        let config_dir = proj_dirs.config_dir();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            debug!(config_dir = ?config_dir, "Created config directory");
        }

        Ok(config_dir.join("config.toml"))
    }

    #[track_caller]
    fn create_default() -> AppResult<Self> {
        let base_dirs = BaseDirs::new().ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get home directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config = Self::with_defaults(&base_dirs.config_dir().join("onedrive"));

        config.save()?;

        warn!(
            program = ?config.sync.program,
            "Default config created. Edit it if the sync client lives elsewhere."
        );

        Ok(config)
    }
}
