use error_location::ErrorLocation;
use thiserror::Error;

/// Process supervision errors with source location tracking.
///
/// Only spawn-time and caller-misuse failures are returned from operations.
/// Runtime conditions of a running child (unexpected exit, a graceful stop
/// that overran its bound) are reported as status events instead.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The executable could not be found or spawned.
    #[error("Failed to launch {program:?}: {reason} {location}")]
    LaunchFailed {
        /// Program that was being launched.
        program: std::path::PathBuf,
        /// Description of the spawn failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// `start` was called while a process is still alive.
    #[error("Process already running with PID {pid:?} {location}")]
    AlreadyRunning {
        /// PID of the live process, if still known.
        pid: Option<u32>,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// `restart` was called before any `start`.
    #[error("No launch configuration recorded; call start first {location}")]
    NotConfigured {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The process survived both the graceful stop and the forced kill.
    #[error("Failed to force kill PID {pid}: {reason} {location}")]
    ForceKillFailed {
        /// PID of the process that could not be killed.
        pid: u32,
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The supervisor was constructed outside a Tokio runtime.
    #[error("Tokio runtime unavailable: {reason} {location}")]
    RuntimeUnavailable {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

/// Result type alias using [`ProcessError`].
pub type Result<T> = std::result::Result<T, ProcessError>;
