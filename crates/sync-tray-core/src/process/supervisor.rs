use crate::{
    CoreResult, ProcessError,
    process::{
        Emitter, EventSink, LaunchSpec, ProcessState, RunningChild, StatusEvent,
        SupervisorConfig,
        event::dispatch,
        monitor::MonitorContext,
        state::{Lifecycle, lock},
    },
};

use std::{
    panic::Location,
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::{process::Command, runtime::Handle};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Extra time, beyond the drain timeout, allowed for an exited run's
/// monitor to publish its final events before a new run starts.
const SETTLE_MARGIN: Duration = Duration::from_millis(500);

/// Owns the lifecycle of one external process.
///
/// # Operations
///
/// `start`, `terminate` and `restart` serialize on an async operation lock,
/// so at most one of them is in flight at a time. `state` and `process_id`
/// only read the shared lifecycle and never wait on that lock.
///
/// # Events
///
/// Captured output and lifecycle transitions are delivered to the
/// [`EventSink`] passed to [`new`](Self::new), from a dedicated dispatcher
/// task, through a bounded channel.
///
/// # Drop
///
/// Dropping the supervisor kills a still-running child.
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    lifecycle: Arc<Mutex<Lifecycle>>,
    control: tokio::sync::Mutex<Control>,
    emitter: Emitter,
}

/// State only touched while the operation lock is held.
struct Control {
    launch: Option<LaunchSpec>,
    running: Option<RunningChild>,
}

impl ProcessSupervisor {
    /// Create a supervisor that forwards events to `sink`.
    ///
    /// Must be called from within a Tokio runtime; the event dispatcher is
    /// spawned onto it.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeUnavailable` outside a Tokio runtime.
    #[track_caller]
    #[instrument(skip(sink))]
    pub fn new<S: EventSink>(config: SupervisorConfig, sink: S) -> CoreResult<Self> {
        let handle = Handle::try_current().map_err(|e| ProcessError::RuntimeUnavailable {
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let (emitter, rx) = Emitter::channel(config.event_capacity);
        handle.spawn(dispatch(rx, sink));

        debug!("ProcessSupervisor initialized");

        Ok(Self {
            config,
            lifecycle: Arc::new(Mutex::new(Lifecycle::new())),
            control: tokio::sync::Mutex::new(Control {
                launch: None,
                running: None,
            }),
            emitter,
        })
    }

    /// Launch `program` with `args` and begin capturing its output.
    ///
    /// The launch spec is remembered for [`restart`](Self::restart), even if
    /// this launch fails.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a process is alive; it is left untouched.
    /// - `LaunchFailed` if the program is missing or cannot be executed. The
    ///   state is unchanged.
    #[instrument(skip_all)]
    pub async fn start<P, I, S>(&self, program: P, args: I) -> CoreResult<()>
    where
        P: Into<std::path::PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_with(LaunchSpec::new(program, args)).await
    }

    /// [`start`](Self::start) with a prepared [`LaunchSpec`].
    #[instrument(skip(self))]
    pub async fn start_with(&self, spec: LaunchSpec) -> CoreResult<()> {
        let mut control = self.control.lock().await;

        self.ensure_not_live()?;
        control.launch = Some(spec.clone());

        if let Some(previous) = control.running.take() {
            self.settle(previous).await;
        }

        self.spawn_locked(&mut control, &spec).await?;

        Ok(())
    }

    /// Stop the running process, blocking until it has exited.
    ///
    /// Sends a graceful stop request (SIGTERM on Unix) and waits up to
    /// `terminate_timeout`. If the process is still alive, emits
    /// `TerminationTimeout` and force kills it, waiting up to `kill_timeout`.
    /// Succeeds without emitting anything when no process is running.
    ///
    /// # Errors
    ///
    /// Returns `ForceKillFailed` if the process outlives the forced kill.
    #[instrument(skip(self))]
    pub async fn terminate(&self) -> CoreResult<()> {
        let mut control = self.control.lock().await;
        self.terminate_locked(&mut control).await
    }

    /// Terminate the current process and start it again with the last
    /// launch spec.
    ///
    /// Emits `Restarting` first and `RestartComplete` once the new process
    /// runs, with the usual `Terminated` / `Started` events in between.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if `start` was never called.
    /// - Any error from the terminate or launch steps.
    #[instrument(skip(self))]
    pub async fn restart(&self) -> CoreResult<()> {
        let mut control = self.control.lock().await;

        let spec = control
            .launch
            .clone()
            .ok_or_else(|| ProcessError::NotConfigured {
                location: ErrorLocation::from(Location::caller()),
            })?;

        self.emitter.status(StatusEvent::Restarting).await;

        self.terminate_locked(&mut control).await?;
        let pid = self.spawn_locked(&mut control, &spec).await?;

        self.emitter
            .status(StatusEvent::RestartComplete { pid })
            .await;

        Ok(())
    }

    /// OS process identifier, only while the state is `Running`.
    pub fn process_id(&self) -> Option<u32> {
        let lifecycle = lock(&self.lifecycle);
        match lifecycle.state {
            ProcessState::Running => lifecycle.pid,
            _ => None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        lock(&self.lifecycle).state
    }

    /// The launch spec `restart` would use, if any.
    pub async fn launch_spec(&self) -> Option<LaunchSpec> {
        self.control.lock().await.launch.clone()
    }

    #[track_caller]
    fn ensure_not_live(&self) -> CoreResult<()> {
        let lifecycle = lock(&self.lifecycle);
        if lifecycle.state.is_live() {
            return Err(ProcessError::AlreadyRunning {
                pid: lifecycle.pid,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }

    /// Spawn `spec` and hand the child to a monitor. Caller holds the
    /// operation lock.
    async fn spawn_locked(&self, control: &mut Control, spec: &LaunchSpec) -> CoreResult<u32> {
        self.ensure_not_live()?;

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::LaunchFailed {
                program: spec.program.clone(),
                reason: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            return Err(ProcessError::LaunchFailed {
                program: spec.program.clone(),
                reason: "process exited before its PID was read".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let run_id = Uuid::new_v4();
        let generation = {
            let mut lifecycle = lock(&self.lifecycle);
            lifecycle.generation += 1;
            lifecycle.state = ProcessState::Running;
            lifecycle.pid = Some(pid);
            lifecycle.generation
        };

        info!(
            run_id = %run_id,
            pid,
            program = ?spec.program,
            args = ?spec.args,
            "Process spawned"
        );

        // Emitted before the readers exist so `Started` precedes the
        // child's first line.
        self.emitter.status(StatusEvent::Started { pid }).await;

        control.running = Some(RunningChild::spawn(
            child,
            MonitorContext {
                pid,
                run_id,
                generation,
                lifecycle: Arc::clone(&self.lifecycle),
                emitter: self.emitter.clone(),
                drain_timeout: self.config.drain_timeout,
            },
        ));

        Ok(pid)
    }

    /// Graceful stop with forced-kill escalation. Caller holds the
    /// operation lock.
    async fn terminate_locked(&self, control: &mut Control) -> CoreResult<()> {
        let Some(mut running) = control.running.take() else {
            debug!("No process to terminate");
            return Ok(());
        };

        let live = {
            let mut lifecycle = lock(&self.lifecycle);
            let live = lifecycle.generation == running.generation && lifecycle.state.is_live();
            if live {
                lifecycle.state = ProcessState::Terminating;
            }
            live
        };

        if !live {
            debug!(pid = running.pid, "Process already exited");
            self.settle(running).await;
            return Ok(());
        }

        let pid = running.pid;
        running.request_stop();

        let report = match running.wait_exit(self.config.terminate_timeout).await {
            Some(report) => report,
            None => {
                self.emitter
                    .status(StatusEvent::TerminationTimeout { pid })
                    .await;
                running.request_kill();

                match running.wait_exit(self.config.kill_timeout).await {
                    Some(report) => report,
                    None => {
                        let kill_ms = self.config.kill_timeout.as_millis();
                        // Kept so a later terminate can retry the kill.
                        control.running = Some(running);
                        return Err(ProcessError::ForceKillFailed {
                            pid,
                            reason: format!("still alive {kill_ms}ms after kill"),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                }
            }
        };

        // Normally the monitor already did this; not if it vanished.
        lock(&self.lifecycle).mark_exited(running.generation);

        debug!(pid, code = ?report.code, "Termination complete");
        self.emitter.status(StatusEvent::Terminated).await;

        Ok(())
    }

    /// Let an already exited run's monitor finish draining and reporting,
    /// so its last events precede anything from the next run.
    async fn settle(&self, mut previous: RunningChild) {
        let limit = self.config.drain_timeout + SETTLE_MARGIN;
        if previous.wait_exit(limit).await.is_none() {
            debug!(pid = previous.pid, "Previous run still draining, moving on");
        }
    }
}
