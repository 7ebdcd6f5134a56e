mod config;
mod event;
pub(crate) mod monitor;
pub(crate) mod state;
mod supervisor;

pub(crate) use {event::Emitter, monitor::RunningChild};

pub use {
    config::{LaunchSpec, SupervisorConfig},
    event::{EventSink, LogLine, OutputSource, StatusEvent, SupervisorEvent},
    state::ProcessState,
    supervisor::ProcessSupervisor,
};
