//! File-backed log console.
//!
//! Every supervisor event is appended to one log file, which the tray's
//! "Log Console" entry opens in the desktop's default viewer.

use crate::{AppError, AppResult};

use std::{
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
};

use error_location::ErrorLocation;
use sync_tray_core::SupervisorEvent;
use tracing::{info, instrument};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Append-only sink for captured client output and status events.
pub struct LogConsole {
    writer: RollingFileAppender,
    path: PathBuf,
}

impl LogConsole {
    /// Open (or create) `file_name` inside `directory`.
    #[track_caller]
    #[instrument]
    pub fn open(directory: &Path, file_name: &str) -> AppResult<Self> {
        fs::create_dir_all(directory)?;

        // With Rotation::NEVER the prefix is the whole file name.
        let writer = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(directory)
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to open log file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let path = directory.join(file_name);
        info!(path = ?path, "Log console opened");

        Ok(Self { writer, path })
    }

    /// Append one supervisor event.
    #[track_caller]
    pub fn write_event(&mut self, event: &SupervisorEvent) -> AppResult<()> {
        self.write_line(&event.to_string())
    }

    /// Append an app-level note, e.g. a failure the supervisor never saw.
    #[track_caller]
    pub fn write_note(&mut self, note: &str) -> AppResult<()> {
        self.write_line(&format!("[tray] {note}"))
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[track_caller]
    fn write_line(&mut self, line: &str) -> AppResult<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}
