//! Desktop notifications for status queries and failures.

use crate::{AppError, AppResult};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use notify_rust::{Notification, Timeout};
use tracing::{debug, instrument};

/// Shows desktop notifications titled with the tray's display name.
pub struct Notifier {
    title: String,
    timeout: Duration,
}

impl Notifier {
    /// Create a notifier.
    pub fn new(title: impl Into<String>, timeout: Duration) -> Self {
        Self {
            title: title.into(),
            timeout,
        }
    }

    /// Show `body` as a notification.
    ///
    /// Runs on the blocking pool: on Linux the D-Bus call is synchronous.
    #[instrument(skip(self))]
    pub async fn notify(&self, body: String) -> AppResult<()> {
        let title = self.title.clone();
        let timeout_ms = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);

        let shown = tokio::task::spawn_blocking(move || {
            Notification::new()
                .appname(&title)
                .summary(&title)
                .body(&body)
                .timeout(Timeout::Milliseconds(timeout_ms))
                .show()
                .map(|_| ())
                .map_err(|e| AppError::NotificationFailed {
                    reason: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })
        })
        .await
        .map_err(|e| AppError::NotificationFailed {
            reason: format!("Notification task panicked: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        shown?;

        debug!("Notification shown");

        Ok(())
    }
}

/// Text of the Status menu notification.
pub(crate) fn status_message(display_name: &str, pid: Option<u32>) -> String {
    match pid {
        Some(pid) => format!("{display_name} is running with the PID {pid}."),
        None => format!("{display_name} is not running. Please restart it from the tray menu."),
    }
}

/// Text of the notification shown when the client dies on its own.
pub(crate) fn unexpected_exit_message(display_name: &str, code: Option<i32>) -> String {
    match code {
        Some(code) => format!("{display_name} stopped unexpectedly (exit code {code})."),
        None => format!("{display_name} was killed unexpectedly."),
    }
}
