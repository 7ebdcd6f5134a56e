use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Which output channel of the child a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for OutputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSource::Stdout => f.write_str("stdout"),
            OutputSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// One captured line of child output.
///
/// Sequence numbers come from a single per-supervisor counter, so they
/// strictly increase within one channel. Lines from stdout and stderr are
/// not ordered relative to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Originating channel.
    pub source: OutputSource,
    /// Line text without its trailing newline.
    pub text: String,
    /// Monotonic sequence number.
    pub sequence: u64,
}

/// Supervisor lifecycle notifications.
///
/// Carries no display text; the UI layer decides how to present each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A process was spawned.
    Started {
        /// OS process identifier.
        pid: u32,
    },
    /// A restart was requested.
    Restarting,
    /// A restart finished and the new process is running.
    RestartComplete {
        /// OS process identifier of the new process.
        pid: u32,
    },
    /// A requested termination completed.
    Terminated,
    /// The graceful stop overran its bound; a forced kill follows.
    TerminationTimeout {
        /// PID being force killed.
        pid: u32,
    },
    /// The process exited without being asked to.
    UnexpectedExit {
        /// Exit code, or `None` when terminated by a signal.
        code: Option<i32>,
    },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Started { pid } => write!(f, "process started (PID {pid})"),
            StatusEvent::Restarting => f.write_str("restarting process"),
            StatusEvent::RestartComplete { pid } => {
                write!(f, "process restarted (PID {pid})")
            }
            StatusEvent::Terminated => f.write_str("process terminated"),
            StatusEvent::TerminationTimeout { pid } => {
                write!(f, "PID {pid} ignored termination request, killing")
            }
            StatusEvent::UnexpectedExit { code: Some(code) } => {
                write!(f, "process exited unexpectedly with code {code}")
            }
            StatusEvent::UnexpectedExit { code: None } => {
                f.write_str("process exited unexpectedly (killed by signal)")
            }
        }
    }
}

/// Item type of the supervisor's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Captured child output.
    Log(LogLine),
    /// Lifecycle transition.
    Status(StatusEvent),
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorEvent::Log(line) => {
                write!(f, "[{} #{}] {}", line.source, line.sequence, line.text)
            }
            SupervisorEvent::Status(status) => write!(f, "[status] {status}"),
        }
    }
}

/// Receiver of supervisor events.
///
/// Called from a single dispatcher task, one event at a time. Implementations
/// should return quickly; a slow sink applies backpressure to the output
/// readers through the bounded channel.
pub trait EventSink: Send + Sync + 'static {
    /// Handle one event.
    fn deliver(&self, event: SupervisorEvent);
}

impl<F> EventSink for F
where
    F: Fn(SupervisorEvent) + Send + Sync + 'static,
{
    fn deliver(&self, event: SupervisorEvent) {
        self(event)
    }
}

/// Producer side of the bounded event channel.
///
/// Cloned into every reader and monitor task. Owns the sequence counter so
/// numbering is shared across restarts.
#[derive(Clone)]
pub(crate) struct Emitter {
    tx: mpsc::Sender<SupervisorEvent>,
    sequence: Arc<AtomicU64>,
}

impl Emitter {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let emitter = Self {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
        };
        (emitter, rx)
    }

    /// Stamp a line with the next sequence number and forward it.
    pub(crate) async fn log(&self, source: OutputSource, text: String) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.send(SupervisorEvent::Log(LogLine {
            source,
            text,
            sequence,
        }))
        .await;
    }

    /// Record a status transition in the tracing log and forward it.
    pub(crate) async fn status(&self, status: StatusEvent) {
        match status {
            StatusEvent::TerminationTimeout { .. } | StatusEvent::UnexpectedExit { .. } => {
                warn!(status = ?status, "{}", status);
            }
            _ => info!(status = ?status, "{}", status),
        }
        self.send(SupervisorEvent::Status(status)).await;
    }

    async fn send(&self, event: SupervisorEvent) {
        if let Err(e) = self.tx.send(event).await {
            debug!(event = ?e.0, "Event dispatcher gone, dropping event");
        }
    }
}

/// Drain the event channel into the sink until every producer is dropped.
pub(crate) async fn dispatch<S: EventSink>(mut rx: mpsc::Receiver<SupervisorEvent>, sink: S) {
    while let Some(event) = rx.recv().await {
        sink.deliver(event);
    }
    debug!("Event dispatcher stopped");
}
