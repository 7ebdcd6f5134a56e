use std::{path::PathBuf, time::Duration};

/// Default bound on the graceful stop before escalating to a forced kill.
pub(crate) const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the forced kill itself.
pub(crate) const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time the exit monitor waits for output readers to hit EOF.
///
/// A grandchild that inherited the pipes can keep them open after the
/// child exits; the monitor stops waiting after this long.
pub(crate) const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Default capacity of the bounded event channel.
pub(crate) const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Program and arguments of the supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable path.
    pub program: PathBuf,
    /// Ordered command-line arguments.
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Build a launch spec from a program and any iterable of arguments.
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Timeouts and buffering for a [`ProcessSupervisor`](crate::ProcessSupervisor).
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// How long `terminate` waits after the graceful stop request.
    pub terminate_timeout: Duration,
    /// How long `terminate` waits after escalating to a forced kill.
    pub kill_timeout: Duration,
    /// How long the exit monitor waits for stdout/stderr to drain.
    pub drain_timeout: Duration,
    /// Capacity of the bounded channel between readers and the sink.
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
