use sync_tray_core::StatusEvent;

/// Tray icon states corresponding to the sync client's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayIconState {
    /// Client is running.
    Running,
    /// Client is not running.
    Stopped,
    /// A restart is in progress.
    Restarting,
}

impl TrayIconState {
    /// Icon state a status event moves the tray to, if any.
    pub fn from_status(status: &StatusEvent) -> Option<Self> {
        match status {
            StatusEvent::Started { .. } | StatusEvent::RestartComplete { .. } => {
                Some(TrayIconState::Running)
            }
            StatusEvent::Restarting => Some(TrayIconState::Restarting),
            StatusEvent::Terminated | StatusEvent::UnexpectedExit { .. } => {
                Some(TrayIconState::Stopped)
            }
            StatusEvent::TerminationTimeout { .. } => None,
        }
    }

    /// RGB color of the status dot.
    pub fn color(self) -> [u8; 3] {
        match self {
            TrayIconState::Running => [0x2e, 0xa0, 0x43],
            TrayIconState::Stopped => [0xd0, 0x3a, 0x2f],
            TrayIconState::Restarting => [0xe0, 0xa0, 0x1b],
        }
    }

    /// Tooltip suffix after the display name.
    pub fn label(self) -> &'static str {
        match self {
            TrayIconState::Running => "Running",
            TrayIconState::Stopped => "Stopped",
            TrayIconState::Restarting => "Restarting...",
        }
    }
}
