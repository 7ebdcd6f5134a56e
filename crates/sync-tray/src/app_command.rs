/// Commands handled by the application loop.
///
/// Produced by tray menu clicks and by the OS signal listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Open the captured output log.
    OpenLogConsole,
    /// Open the configuration file.
    OpenConfiguration,
    /// Report whether the sync client is running, and its PID.
    ShowStatus,
    /// Terminate and relaunch the sync client.
    Restart,
    /// Terminate the sync client and exit.
    Shutdown,
}
