use crate::{
    AppCommand, AppError, AppResult, LogConsole, MenuIds, Notifier, TrayCommand, TrayIconState,
    config::Config,
    notifier::{status_message, unexpected_exit_message},
    shutdown_signal::wait_for_shutdown_signal,
};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use sync_tray_core::{ProcessError, ProcessSupervisor, StatusEvent, SupervisorEvent};
use tao::event_loop::EventLoopProxy;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, instrument, warn};
use tray_icon::menu::MenuEvent;

/// Supervisor events buffered for the app loop while it is busy, e.g.
/// awaiting a restart.
pub(crate) const SUPERVISOR_EVENT_BUFFER: usize = 4096;

/// Event sink that hands supervisor events to the app loop.
///
/// Never blocks the supervisor's dispatcher: when the buffer is full the
/// event is dropped and logged.
pub(crate) fn forward_events(
    tx: mpsc::Sender<SupervisorEvent>,
) -> impl Fn(SupervisorEvent) + Send + Sync + 'static {
    move |event: SupervisorEvent| match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(event = %event, "App loop busy, dropping supervisor event");
        }
        Err(TrySendError::Closed(_)) => {
            debug!("App loop gone, dropping supervisor event");
        }
    }
}

/// Main application state.
///
/// Runs on the async runtime thread. Communicates tray icon updates
/// back to the main thread via `tray_proxy` because `TrayIcon` is `!Send`
/// and must remain on the UI thread.
pub struct App {
    pub(crate) config: Config,
    pub(crate) supervisor: ProcessSupervisor,
    pub(crate) supervisor_rx: mpsc::Receiver<SupervisorEvent>,
    pub(crate) log_console: LogConsole,
    pub(crate) notifier: Notifier,
    pub(crate) tray_proxy: EventLoopProxy<TrayCommand>,
    pub(crate) command_tx: mpsc::Sender<AppCommand>,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) menu_ids: MenuIds,
}

impl App {
    /// Build the application. Must run inside the Tokio runtime.
    #[track_caller]
    #[instrument(skip_all)]
    pub(crate) fn new(
        config: Config,
        tray_proxy: EventLoopProxy<TrayCommand>,
        menu_ids: MenuIds,
    ) -> AppResult<Self> {
        let log_console = LogConsole::open(&config.log_directory()?, &config.log.file_name)?;
        let notifier = Notifier::new(
            config.sync.display_name.clone(),
            config.notification_timeout(),
        );

        let (event_tx, supervisor_rx) = mpsc::channel(SUPERVISOR_EVENT_BUFFER);
        let supervisor = ProcessSupervisor::new(
            config.supervisor.to_supervisor_config(),
            forward_events(event_tx),
        )?;

        let (command_tx, command_rx) = mpsc::channel(32);

        Ok(Self {
            config,
            supervisor,
            supervisor_rx,
            log_console,
            notifier,
            tray_proxy,
            command_tx,
            command_rx,
            menu_ids,
        })
    }

    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!(program = ?self.config.sync.program, "Sync-Tray starting");

        if self.config.sync.start_on_launch {
            self.start_sync().await;
        }

        // Tray event forwarding via single persistent blocking task.
        //
        // MenuEvent::receiver() returns a crossbeam_channel::Receiver which
        // HAS blocking recv() -- zero polling, instant response, one thread.
        //
        // Shutdown: when tray_event_rx is dropped (main loop breaks),
        // tray_event_tx.blocking_send() fails, breaking the blocking loop.
        let (tray_event_tx, mut tray_event_rx) = mpsc::channel(32);
        let tray_handle = tokio::task::spawn_blocking(move || {
            let receiver = MenuEvent::receiver();
            while let Ok(event) = receiver.recv() {
                if tray_event_tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });

        let signal_tx = self.command_tx.clone();
        let signal_handle = tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            if let Err(e) = signal_tx.send(AppCommand::Shutdown).await {
                debug!(error = ?e, "App loop gone before shutdown signal");
            }
        });

        loop {
            let command = tokio::select! {
                Some(event) = self.supervisor_rx.recv() => {
                    self.handle_supervisor_event(event).await;
                    continue;
                }

                Some(event) = tray_event_rx.recv() => {
                    match self.menu_ids.command_for(&event.id) {
                        Some(command) => command,
                        None => continue,
                    }
                }

                Some(command) = self.command_rx.recv() => command,

                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            };

            if command == AppCommand::Shutdown {
                info!("Shutdown requested");
                break;
            }

            if let Err(e) = self.handle_command(command).await {
                error!(command = ?command, error = ?e, "Failed to handle command");
            }
        }

        signal_handle.abort();
        drop(tray_event_rx);

        match tokio::time::timeout(Duration::from_secs(1), tray_handle).await {
            Ok(Ok(())) => info!("Tray event forwarder stopped cleanly"),
            Ok(Err(e)) => error!(error = ?e, "Tray event forwarder task panicked"),
            Err(_) => info!(
                "Tray event forwarder did not stop within timeout, \
                     will be cleaned up on exit"
            ),
        }

        self.shutdown().await;

        Ok(())
    }

    /// Launch the configured client, reporting failure to the operator.
    #[instrument(skip(self))]
    async fn start_sync(&mut self) {
        let spec = self.config.launch_spec();

        if let Err(e) = self.supervisor.start_with(spec).await {
            self.report_failure("Failed to start sync client", AppError::from(e))
                .await;
        }
    }

    /// Handle a tray menu command.
    #[instrument(skip(self))]
    async fn handle_command(&mut self, command: AppCommand) -> AppResult<()> {
        match command {
            AppCommand::OpenLogConsole => {
                open::that(self.log_console.path())?;
                info!(path = ?self.log_console.path(), "Opened log console");
            }
            AppCommand::OpenConfiguration => {
                let path = Config::config_path()?;
                open::that(&path)?;
                info!(path = ?path, "Opened configuration");
            }
            AppCommand::ShowStatus => {
                let pid = self.supervisor.process_id();
                info!(pid = ?pid, state = %self.supervisor.state(), "Status requested");
                self.notifier
                    .notify(status_message(&self.config.sync.display_name, pid))
                    .await?;
            }
            AppCommand::Restart => match self.supervisor.restart().await {
                Ok(()) => {}
                // Never started (start_on_launch = false): restart means start.
                Err(ProcessError::NotConfigured { .. }) => self.start_sync().await,
                Err(e) => {
                    self.report_failure("Failed to restart sync client", AppError::from(e))
                        .await;
                }
            },
            AppCommand::Shutdown => debug!("Shutdown is handled by the run loop"),
        }

        Ok(())
    }

    /// Record a supervisor event and reflect status changes in the tray.
    async fn handle_supervisor_event(&mut self, event: SupervisorEvent) {
        if let Err(e) = self.log_console.write_event(&event) {
            error!(error = ?e, "Failed to write log console");
        }

        let SupervisorEvent::Status(status) = event else {
            return;
        };

        if let Some(state) = TrayIconState::from_status(&status) {
            self.send_tray(TrayCommand::SetState(state));
        }

        if let StatusEvent::UnexpectedExit { code } = status {
            let message = unexpected_exit_message(&self.config.sync.display_name, code);
            if let Err(e) = self.notifier.notify(message).await {
                warn!(error = ?e, "Failed to show exit notification");
            }
        }
    }

    /// Log, record and notify a failure the supervisor returned to us.
    async fn report_failure(&mut self, what: &str, e: AppError) {
        error!(error = ?e, "{}", what);

        if let Err(log_err) = self.log_console.write_note(&format!("{what}: {e}")) {
            error!(error = ?log_err, "Failed to write log console");
        }

        if let Err(notify_err) = self.notifier.notify(format!("{what}.")).await {
            warn!(error = ?notify_err, "Failed to show failure notification");
        }
    }

    fn send_tray(&self, command: TrayCommand) {
        if let Err(e) = self.tray_proxy.send_event(command) {
            let e = AppError::ChannelSendFailed {
                message: format!("Failed to send {:?} to tray: {:?}", command, e),
                location: ErrorLocation::from(Location::caller()),
            };
            warn!(error = ?e, "Tray update dropped");
        }
    }

    /// Stop the client, flush its last events to the log, and close the tray.
    #[instrument(skip(self))]
    async fn shutdown(self) {
        let App {
            supervisor,
            mut supervisor_rx,
            mut log_console,
            tray_proxy,
            ..
        } = self;

        if let Err(e) = supervisor.terminate().await {
            error!(error = ?e, "Failed to terminate sync client");
        }

        // The dispatcher ends once the supervisor is gone, closing the stream.
        drop(supervisor);
        let drain = async {
            while let Some(event) = supervisor_rx.recv().await {
                if let Err(e) = log_console.write_event(&event) {
                    error!(error = ?e, "Failed to write log console");
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(1), drain).await.is_err() {
            warn!("Supervisor events still pending at exit");
        }

        let _ = tray_proxy.send_event(TrayCommand::Shutdown);
        info!("Sync-Tray shut down successfully");
    }
}
