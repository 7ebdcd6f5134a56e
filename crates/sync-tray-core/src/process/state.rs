use std::{
    fmt,
    sync::{Mutex, MutexGuard},
};

use tracing::error;

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No process has been started yet.
    NotStarted,
    /// A process is alive and its output is being captured.
    Running,
    /// A terminate or restart request is in progress.
    Terminating,
    /// The process has exited.
    Stopped,
}

impl ProcessState {
    /// Whether an OS process may still be associated with this state.
    pub fn is_live(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Terminating)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::NotStarted => "not started",
            ProcessState::Running => "running",
            ProcessState::Terminating => "terminating",
            ProcessState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Lifecycle state shared between the supervisor and the exit monitor.
///
/// Guarded by a `std::sync::Mutex` and only held for field updates, never
/// across an `.await`.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    pub(crate) state: ProcessState,
    pub(crate) pid: Option<u32>,
    /// Incremented on every spawn so a monitor never updates a newer run.
    pub(crate) generation: u64,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: ProcessState::NotStarted,
            pid: None,
            generation: 0,
        }
    }

    /// Move run `generation` to `Stopped` and forget its PID.
    ///
    /// Returns the state it left, or `None` when the run was already
    /// stopped or a newer run has replaced it.
    pub(crate) fn mark_exited(&mut self, generation: u64) -> Option<ProcessState> {
        if self.generation != generation || !self.state.is_live() {
            return None;
        }

        let previous = self.state;
        self.state = ProcessState::Stopped;
        self.pid = None;
        Some(previous)
    }
}

/// Lock the shared lifecycle, recovering from poison.
///
/// A poisoned lock means a holder panicked mid-update; the fields are plain
/// values and remain usable.
pub(crate) fn lock(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    lifecycle.lock().unwrap_or_else(|e| {
        error!("Lifecycle lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
