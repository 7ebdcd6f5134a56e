//! Output readers and exit monitor for one spawned child.
//!
//! The monitor task owns the `Child` handle for its whole life. The
//! supervisor keeps only a [`RunningChild`]: a stop-request channel and a
//! watch on the exit report. Signals are only ever sent by the monitor,
//! while it still holds the unreaped child.

use crate::process::{
    Emitter, OutputSource, ProcessState, StatusEvent,
    state::{Lifecycle, lock},
};

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    process::Child,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Longest chunk emitted as one `LogLine`. Longer lines are split.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long an unterminated line may sit in the buffer before it is
/// forwarded as is.
pub(crate) const PARTIAL_LINE_FLUSH: Duration = Duration::from_millis(250);

/// How a child exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExitReport {
    /// Exit code, `None` when killed by a signal.
    pub(crate) code: Option<i32>,
}

/// Requests the supervisor sends to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopRequest {
    /// SIGTERM where available, otherwise a forced kill.
    Graceful,
    /// Forced kill.
    Kill,
}

/// Everything the monitor needs besides the child itself.
pub(crate) struct MonitorContext {
    pub(crate) pid: u32,
    pub(crate) run_id: Uuid,
    pub(crate) generation: u64,
    pub(crate) lifecycle: Arc<Mutex<Lifecycle>>,
    pub(crate) emitter: Emitter,
    pub(crate) drain_timeout: Duration,
}

/// Supervisor-side handle to a monitored child.
///
/// Dropping it closes the stop channel, which the monitor treats as a kill
/// request.
pub(crate) struct RunningChild {
    pub(crate) pid: u32,
    pub(crate) generation: u64,
    stop_tx: mpsc::Sender<StopRequest>,
    exit_rx: watch::Receiver<Option<ExitReport>>,
}

impl RunningChild {
    /// Start the output readers and the exit monitor for `child`.
    pub(crate) fn spawn(mut child: Child, ctx: MonitorContext) -> Self {
        let span = info_span!("child", pid = ctx.pid, run_id = %ctx.run_id);

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(
                read_lines(stdout, OutputSource::Stdout, ctx.emitter.clone())
                    .instrument(span.clone()),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(
                read_lines(stderr, OutputSource::Stderr, ctx.emitter.clone())
                    .instrument(span.clone()),
            ));
        }

        let (stop_tx, stop_rx) = mpsc::channel(4);
        let (exit_tx, exit_rx) = watch::channel(None);
        let pid = ctx.pid;
        let generation = ctx.generation;

        tokio::spawn(monitor(child, stop_rx, readers, exit_tx, ctx).instrument(span));

        Self {
            pid,
            generation,
            stop_tx,
            exit_rx,
        }
    }

    /// Ask the monitor to stop the child gracefully.
    pub(crate) fn request_stop(&self) {
        self.send(StopRequest::Graceful);
    }

    /// Ask the monitor to force kill the child.
    pub(crate) fn request_kill(&self) {
        self.send(StopRequest::Kill);
    }

    fn send(&self, request: StopRequest) {
        if let Err(e) = self.stop_tx.try_send(request) {
            debug!(pid = self.pid, request = ?request, error = %e, "Stop request not delivered");
        }
    }

    /// Wait up to `limit` for the monitor's exit report.
    ///
    /// Returns `None` on timeout. A monitor that vanished without reporting
    /// took the child handle with it (kill-on-drop), so that counts as exited.
    pub(crate) async fn wait_exit(&mut self, limit: Duration) -> Option<ExitReport> {
        match tokio::time::timeout(limit, self.exit_rx.wait_for(Option::is_some)).await {
            Ok(Ok(report)) => *report,
            Ok(Err(_)) => {
                warn!(pid = self.pid, "Exit monitor gone without a report");
                Some(ExitReport { code: None })
            }
            Err(_) => None,
        }
    }
}

/// Forward `stream` to the emitter until EOF.
///
/// Output is split on `\n`. A line longer than [`MAX_LINE_BYTES`] is
/// forwarded in chunks of that size, and an unterminated line is forwarded
/// once the stream has been quiet for [`PARTIAL_LINE_FLUSH`].
async fn read_lines<R>(stream: R, source: OutputSource, emitter: Emitter)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut after_partial = false;

    loop {
        if buf.is_empty() {
            // Wait for data without a deadline; only a pending partial
            // line needs the idle flush.
            match reader.fill_buf().await {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(source = %source, error = %e, "Output read failed");
                    break;
                }
            }
        }

        let remaining = (MAX_LINE_BYTES - buf.len()) as u64;
        let mut limited = (&mut reader).take(remaining);
        let read = limited.read_until(b'\n', &mut buf);

        match tokio::time::timeout(PARTIAL_LINE_FLUSH, read).await {
            Err(_) => {
                if !buf.is_empty() {
                    emit_line(&emitter, source, &buf).await;
                    after_partial = true;
                    buf.clear();
                }
            }
            // `take` never reports 0 with room left, so this is EOF.
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let complete = buf.ends_with(b"\n");
                if complete || buf.len() >= MAX_LINE_BYTES {
                    // A bare newline closing a line whose text already went out.
                    if !(after_partial && trim_line_ending(&buf).is_empty()) {
                        emit_line(&emitter, source, &buf).await;
                    }
                    after_partial = !complete;
                    buf.clear();
                }
            }
            Ok(Err(e)) => {
                warn!(source = %source, error = %e, "Output read failed");
                break;
            }
        }
    }

    if !buf.is_empty() {
        emit_line(&emitter, source, &buf).await;
    }

    debug!(source = %source, "Output stream closed");
}

async fn emit_line(emitter: &Emitter, source: OutputSource, raw: &[u8]) {
    let text = String::from_utf8_lossy(trim_line_ending(raw)).into_owned();
    emitter.log(source, text).await;
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

async fn monitor(
    mut child: Child,
    mut stop_rx: mpsc::Receiver<StopRequest>,
    readers: Vec<JoinHandle<()>>,
    exit_tx: watch::Sender<Option<ExitReport>>,
    ctx: MonitorContext,
) {
    let mut stop_requested = false;
    let mut channel_open = true;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            request = stop_rx.recv(), if channel_open => {
                stop_requested = true;
                match request {
                    Some(StopRequest::Graceful) => {
                        if !send_graceful_stop(&child) {
                            force_kill(&mut child);
                        }
                    }
                    Some(StopRequest::Kill) => force_kill(&mut child),
                    None => {
                        debug!("Supervisor dropped, killing child");
                        channel_open = false;
                        force_kill(&mut child);
                    }
                }
            }
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "Failed to collect exit status");
            None
        }
    };

    // The child is reaped: the PID is no longer ours, so the lifecycle
    // forgets it before anything else happens.
    let previous = lock(&ctx.lifecycle).mark_exited(ctx.generation);
    let unexpected = !stop_requested && previous == Some(ProcessState::Running);

    info!(code = ?code, unexpected, "Process exited");

    // Readers hit EOF once the child's pipe ends close. A grandchild that
    // inherited them can hold them open, so the wait is bounded.
    let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();
    let drain = async {
        for reader in readers {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(ctx.drain_timeout, drain).await.is_err() {
        warn!(
            drain_ms = ctx.drain_timeout.as_millis(),
            "Output still open after exit, abandoning readers"
        );
        for abort in aborts {
            abort.abort();
        }
    }

    // Emitted after the drain so it follows the child's last line.
    if unexpected {
        ctx.emitter
            .status(StatusEvent::UnexpectedExit { code })
            .await;
    }

    let _ = exit_tx.send(Some(ExitReport { code }));
}

fn force_kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to send kill");
    }
}

/// Send SIGTERM to the still-unreaped child. Returns `false` if it could
/// not be delivered.
#[cfg(unix)]
fn send_graceful_stop(child: &Child) -> bool {
    use nix::{
        sys::signal::{Signal, kill},
        unistd::Pid,
    };

    let Some(pid) = child.id() else {
        debug!("Child already reaped, nothing to signal");
        return false;
    };
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "PID out of range for signal delivery");
        return false;
    };

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => {
            debug!(pid, "Sent SIGTERM");
            true
        }
        Err(e) => {
            warn!(pid, error = %e, "Failed to send SIGTERM, escalating to kill");
            false
        }
    }
}

/// No portable graceful stop signal; go straight to the forced kill.
#[cfg(not(unix))]
fn send_graceful_stop(_child: &Child) -> bool {
    debug!("No graceful stop on this platform");
    false
}
