use crate::{
    OutputSource, ProcessError, ProcessState, StatusEvent, SupervisorConfig, SupervisorEvent,
    process::monitor::MAX_LINE_BYTES,
    tests::process::{collect_until, fast_config, test_supervisor},
};

use std::time::Duration;

use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};

fn is_status(event: &SupervisorEvent, wanted: fn(&StatusEvent) -> bool) -> bool {
    matches!(event, SupervisorEvent::Status(status) if wanted(status))
}

fn is_unexpected_exit(event: &SupervisorEvent) -> bool {
    is_status(event, |s| matches!(s, StatusEvent::UnexpectedExit { .. }))
}

fn stdout_texts(events: &[SupervisorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Log(line) if line.source == OutputSource::Stdout => {
                Some(line.text.clone())
            }
            _ => None,
        })
        .collect()
}

/// WHAT: A started process reports a positive PID
/// WHY: Callers report liveness from process_id()
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_long_running_program_when_started_then_pid_is_positive() {
    // Given: A supervisor
    let (supervisor, _rx) = test_supervisor(fast_config());

    // When: Starting a long-running command
    supervisor.start("sleep", ["30"]).await.unwrap();

    // Then: State is Running with a positive PID
    assert_eq!(supervisor.state(), ProcessState::Running);
    assert!(supervisor.process_id().unwrap() > 0);

    supervisor.terminate().await.unwrap();
}

/// WHAT: Starting twice fails and leaves the first process alone
/// WHY: At most one OS process may be associated with the supervisor
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_process_when_starting_again_then_already_running() {
    // Given: A running process
    let (supervisor, _rx) = test_supervisor(fast_config());
    supervisor.start("sleep", ["30"]).await.unwrap();
    let pid_before = supervisor.process_id();

    // When: Starting again
    let result = supervisor.start("sleep", ["5"]).await;

    // Then: AlreadyRunning, same PID, original launch spec kept
    assert!(matches!(result, Err(ProcessError::AlreadyRunning { .. })));
    assert_eq!(supervisor.process_id(), pid_before);
    assert_eq!(supervisor.launch_spec().await.unwrap().args, vec!["30"]);

    supervisor.terminate().await.unwrap();
}

/// WHAT: Restart without a prior start fails
/// WHY: There is no launch spec to reuse
#[tokio::test]
async fn given_never_started_when_restarting_then_not_configured() {
    // Given: A fresh supervisor
    let (supervisor, _rx) = test_supervisor(fast_config());

    // When: Restarting
    let result = supervisor.restart().await;

    // Then: NotConfigured and still NotStarted
    assert!(matches!(result, Err(ProcessError::NotConfigured { .. })));
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
}

/// WHAT: Terminate with nothing started is a silent no-op
/// WHY: Quit must be safe to call at any time
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_not_started_when_terminating_then_no_op_without_events() {
    // Given: A fresh supervisor
    let (supervisor, mut rx) = test_supervisor(fast_config());

    // When: Terminating
    supervisor.terminate().await.unwrap();

    // Then: Still NotStarted, nothing emitted
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

/// WHAT: Terminate after the process already exited is a silent no-op
/// WHY: No second UnexpectedExit or Terminated may be reported for a dead process
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_stopped_process_when_terminating_then_no_op_without_events() {
    // Given: A short-lived process that has exited
    let (supervisor, mut rx) = test_supervisor(fast_config());
    supervisor.start("true", Vec::<String>::new()).await.unwrap();
    collect_until(&mut rx, is_unexpected_exit).await;
    assert_eq!(supervisor.state(), ProcessState::Stopped);

    // When: Terminating
    supervisor.terminate().await.unwrap();

    // Then: Still Stopped, nothing further emitted
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

/// WHAT: Terminate stops the process and clears the PID
/// WHY: After terminate returns, callers must observe a stopped process
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_process_when_terminated_then_stopped_without_pid() {
    // Given: A running process
    let (supervisor, mut rx) = test_supervisor(fast_config());
    supervisor.start("sleep", ["30"]).await.unwrap();

    // When: Terminating
    supervisor.terminate().await.unwrap();

    // Then: Stopped, no PID, Terminated reported and no UnexpectedExit
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert_eq!(supervisor.process_id(), None);

    let events = collect_until(&mut rx, |e| {
        is_status(e, |s| matches!(s, StatusEvent::Terminated))
    })
    .await;
    assert!(!events.iter().any(is_unexpected_exit));
}

/// WHAT: Stdout lines arrive in write order with increasing sequence numbers
/// WHY: The log view must read like the child's own output
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_child_writing_a_b_c_when_captured_then_ordered_with_increasing_sequence() {
    // Given: A child writing three lines to stdout
    let (supervisor, mut rx) = test_supervisor(fast_config());

    // When: Running it to completion
    supervisor
        .start("/bin/sh", ["-c", "echo A; echo B; echo C"])
        .await
        .unwrap();
    let events = collect_until(&mut rx, is_unexpected_exit).await;

    // Then: A, B, C in order with strictly increasing sequence numbers
    let lines: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect();
    let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["A", "B", "C"]);
    assert!(lines.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

/// WHAT: Echo output is captured and its exit reported afterwards
/// WHY: A sync client that dies on its own must show up in the log
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_echo_hello_when_started_then_stdout_line_then_exit_code_zero() {
    // Given: A supervisor
    let (supervisor, mut rx) = test_supervisor(fast_config());

    // When: Running /bin/echo hello
    supervisor.start("/bin/echo", ["hello"]).await.unwrap();
    let events = collect_until(&mut rx, is_unexpected_exit).await;

    // Then: Started, the hello line, then UnexpectedExit(0) last
    assert!(matches!(
        events.first(),
        Some(SupervisorEvent::Status(StatusEvent::Started { .. }))
    ));
    assert!(stdout_texts(&events).iter().any(|t| t.contains("hello")));
    assert_eq!(
        events.last(),
        Some(&SupervisorEvent::Status(StatusEvent::UnexpectedExit {
            code: Some(0)
        }))
    );
    assert_eq!(supervisor.process_id(), None);
}

/// WHAT: Stderr output is tagged with its source
/// WHY: Operators need to tell diagnostics from regular output
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_child_writing_stderr_when_captured_then_tagged_stderr() {
    // Given: A child writing to stderr and exiting non-zero
    let (supervisor, mut rx) = test_supervisor(fast_config());

    // When: Running it to completion
    supervisor
        .start("/bin/sh", ["-c", "echo oops >&2; exit 3"])
        .await
        .unwrap();
    let events = collect_until(&mut rx, is_unexpected_exit).await;

    // Then: One stderr line and the non-zero code
    assert!(events.iter().any(|event| matches!(
        event,
        SupervisorEvent::Log(line) if line.source == OutputSource::Stderr && line.text == "oops"
    )));
    assert_eq!(
        events.last(),
        Some(&SupervisorEvent::Status(StatusEvent::UnexpectedExit {
            code: Some(3)
        }))
    );
}

/// WHAT: A missing executable fails synchronously
/// WHY: Launch errors must reach the caller, not vanish in a task
#[tokio::test]
async fn given_nonexistent_binary_when_starting_then_launch_failed_and_not_started() {
    // Given: A supervisor
    let (supervisor, _rx) = test_supervisor(fast_config());

    // When: Starting a path that does not exist
    let result = supervisor
        .start("/nonexistent/binary", Vec::<String>::new())
        .await;

    // Then: LaunchFailed and state untouched
    assert!(matches!(result, Err(ProcessError::LaunchFailed { .. })));
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
    assert_eq!(supervisor.process_id(), None);
}

/// WHAT: Restart after a failed launch retries the recorded spec
/// WHY: Installing the missing client then pressing Restart must work
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_failed_launch_when_restarting_then_same_spec_retried() {
    // Given: A launch that failed
    let (supervisor, _rx) = test_supervisor(fast_config());
    let _ = supervisor.start("/nonexistent/binary", ["--monitor"]).await;

    // When: Restarting
    let result = supervisor.restart().await;

    // Then: The recorded spec is retried rather than NotConfigured
    assert!(matches!(result, Err(ProcessError::LaunchFailed { .. })));
    let spec = supervisor.launch_spec().await.unwrap();
    assert_eq!(spec.program, std::path::PathBuf::from("/nonexistent/binary"));
    assert_eq!(spec.args, vec!["--monitor"]);
}

/// WHAT: Restart replaces the process and reports each step once
/// WHY: The tray reports restart progress from these events
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_sleep_when_restarted_then_new_pid_and_ordered_events() {
    // Given: A running process and its Started event consumed
    let (supervisor, mut rx) = test_supervisor(fast_config());
    supervisor.start("sleep", ["30"]).await.unwrap();
    let old_pid = supervisor.process_id().unwrap();
    collect_until(&mut rx, |e| {
        is_status(e, |s| matches!(s, StatusEvent::Started { .. }))
    })
    .await;

    // When: Restarting
    supervisor.restart().await.unwrap();
    let events = collect_until(&mut rx, |e| {
        is_status(e, |s| matches!(s, StatusEvent::RestartComplete { .. }))
    })
    .await;

    // Then: Restarting, Terminated, Started, RestartComplete and a new PID
    let statuses: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Status(status) => Some(*status),
            _ => None,
        })
        .collect();
    let new_pid = supervisor.process_id().unwrap();
    assert_ne!(new_pid, old_pid);
    assert_eq!(
        statuses,
        vec![
            StatusEvent::Restarting,
            StatusEvent::Terminated,
            StatusEvent::Started { pid: new_pid },
            StatusEvent::RestartComplete { pid: new_pid },
        ]
    );

    supervisor.terminate().await.unwrap();
}

/// WHAT: A child ignoring SIGTERM is force killed after the grace period
/// WHY: terminate() must never hang on an unresponsive child
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_child_ignoring_sigterm_when_terminating_then_force_killed() {
    // Given: A child that ignores SIGTERM, with a short grace period
    let config = SupervisorConfig {
        terminate_timeout: Duration::from_millis(300),
        ..fast_config()
    };
    let (supervisor, mut rx) = test_supervisor(config);
    supervisor
        .start("/bin/sh", ["-c", "trap '' TERM; echo ready; exec sleep 30"])
        .await
        .unwrap();
    let pid = supervisor.process_id().unwrap();
    collect_until(&mut rx, |e| {
        matches!(e, SupervisorEvent::Log(line) if line.text == "ready")
    })
    .await;

    // When: Terminating
    supervisor.terminate().await.unwrap();

    // Then: TerminationTimeout then Terminated, process stopped
    let events = collect_until(&mut rx, |e| {
        is_status(e, |s| matches!(s, StatusEvent::Terminated))
    })
    .await;
    assert!(events.contains(&SupervisorEvent::Status(
        StatusEvent::TerminationTimeout { pid }
    )));
    assert_eq!(supervisor.state(), ProcessState::Stopped);
}

/// WHAT: Dropping the supervisor kills its child
/// WHY: The sync client must not be orphaned when the tray exits abruptly
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_process_when_supervisor_dropped_then_child_killed() {
    // Given: A running process
    let (supervisor, _rx) = test_supervisor(fast_config());
    supervisor.start("sleep", ["30"]).await.unwrap();
    let pid = Pid::from_raw(i32::try_from(supervisor.process_id().unwrap()).unwrap());

    // When: Dropping the supervisor
    drop(supervisor);

    // Then: The PID disappears shortly afterwards
    let mut gone = false;
    for _ in 0..50 {
        if kill(pid, None).is_err() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(gone);
}

fn statuses(events: &[SupervisorEvent]) -> Vec<StatusEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Status(status) => Some(*status),
            _ => None,
        })
        .collect()
}

#[allow(clippy::unwrap_used)]
fn os_pid(pid: u32) -> Pid {
    Pid::from_raw(i32::try_from(pid).unwrap())
}

/// WHAT: A crash is reflected in the state as soon as the child is reaped
/// WHY: A background grandchild can hold the pipes open long after the
/// client died; the dead PID must not be reported or signalled meanwhile
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_crash_with_pipes_held_open_when_terminating_then_crash_still_reported() {
    // Given: A child that backgrounds a grandchild and exits 7, with a long drain
    let config = SupervisorConfig {
        drain_timeout: Duration::from_secs(3),
        ..fast_config()
    };
    let (supervisor, mut rx) = test_supervisor(config);
    supervisor
        .start("/bin/sh", ["-c", "sleep 30 & exit 7"])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Then: Already Stopped with no PID while output is still draining
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert_eq!(supervisor.process_id(), None);

    // When: Terminating during the drain
    supervisor.terminate().await.unwrap();

    // Then: The crash is reported with its code, and no Terminated follows
    let events = collect_until(&mut rx, is_unexpected_exit).await;
    assert_eq!(
        events.last(),
        Some(&SupervisorEvent::Status(StatusEvent::UnexpectedExit {
            code: Some(7)
        }))
    );
    assert!(!statuses(&events).contains(&StatusEvent::Terminated));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

/// WHAT: A child killed from outside reports an exit without a code
/// WHY: Signal deaths must not be mistaken for a clean exit
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_child_killed_externally_when_exiting_then_unexpected_exit_without_code() {
    // Given: A running process
    let (supervisor, mut rx) = test_supervisor(fast_config());
    supervisor.start("sleep", ["30"]).await.unwrap();
    let pid = supervisor.process_id().unwrap();

    // When: Something else SIGKILLs it
    kill(os_pid(pid), Signal::SIGKILL).unwrap();

    // Then: UnexpectedExit with no code, and the state is Stopped
    let events = collect_until(&mut rx, is_unexpected_exit).await;
    assert_eq!(
        events.last(),
        Some(&SupervisorEvent::Status(StatusEvent::UnexpectedExit {
            code: None
        }))
    );
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert_eq!(supervisor.process_id(), None);
}

/// WHAT: Restart after a crash skips the termination step
/// WHY: The Restart menu entry is how users recover a dead client
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_crashed_child_when_restarting_then_started_without_terminated() {
    // Given: A process that died on its own
    let (supervisor, mut rx) = test_supervisor(fast_config());
    supervisor.start("sleep", ["30"]).await.unwrap();
    let old_pid = supervisor.process_id().unwrap();
    kill(os_pid(old_pid), Signal::SIGKILL).unwrap();
    collect_until(&mut rx, is_unexpected_exit).await;

    // When: Restarting
    supervisor.restart().await.unwrap();
    let events = collect_until(&mut rx, |e| {
        is_status(e, |s| matches!(s, StatusEvent::RestartComplete { .. }))
    })
    .await;

    // Then: Restarting, Started, RestartComplete with a fresh PID
    let new_pid = supervisor.process_id().unwrap();
    assert_ne!(new_pid, old_pid);
    assert_eq!(
        statuses(&events),
        vec![
            StatusEvent::Restarting,
            StatusEvent::Started { pid: new_pid },
            StatusEvent::RestartComplete { pid: new_pid },
        ]
    );

    supervisor.terminate().await.unwrap();
}

/// WHAT: Output without a trailing newline is forwarded while the child runs
/// WHY: Progress messages must show up without waiting for the next line
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_unterminated_output_when_child_goes_quiet_then_forwarded() {
    // Given: A child printing a partial line then idling
    let (supervisor, mut rx) = test_supervisor(fast_config());
    supervisor
        .start("/bin/sh", ["-c", "printf 'Downloading 50%%'; exec sleep 5"])
        .await
        .unwrap();

    // When: Waiting briefly
    let events = tokio::time::timeout(
        Duration::from_secs(2),
        collect_until(&mut rx, |e| matches!(e, SupervisorEvent::Log(_))),
    )
    .await
    .unwrap();

    // Then: The partial line arrived as is
    assert_eq!(stdout_texts(&events), vec!["Downloading 50%"]);

    supervisor.terminate().await.unwrap();
}

/// WHAT: A line longer than the cap is split into capped chunks
/// WHY: A child that never writes a newline must not grow memory unbounded
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_overlong_line_when_captured_then_split_at_cap() {
    // Given: A child writing one line well over the cap, then a newline
    let (supervisor, mut rx) = test_supervisor(fast_config());
    let script = format!(
        "head -c {} /dev/zero | tr '\\0' x; echo",
        MAX_LINE_BYTES + 100
    );
    supervisor.start("/bin/sh", ["-c", &script]).await.unwrap();

    // When: Running it to completion
    let events = collect_until(&mut rx, is_unexpected_exit).await;

    // Then: No chunk exceeds the cap and all bytes arrive
    let texts = stdout_texts(&events);
    assert!(texts.len() >= 2);
    assert!(texts.iter().all(|t| t.len() <= MAX_LINE_BYTES));
    assert_eq!(
        texts.iter().map(String::len).sum::<usize>(),
        MAX_LINE_BYTES + 100
    );
}
