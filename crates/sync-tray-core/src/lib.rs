//! Sync-Tray Core Library
//!
//! Supervises a single external synchronization process: start, restart and
//! bounded terminate, with its stdout/stderr relayed as an ordered stream of
//! log lines and lifecycle status events.
//!
//! # Example
//!
//! ```no_run
//! use sync_tray_core::{CoreResult, ProcessSupervisor, SupervisorConfig, SupervisorEvent};
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let supervisor = ProcessSupervisor::new(
//!         SupervisorConfig::default(),
//!         |event: SupervisorEvent| println!("{event}"),
//!     )?;
//!
//!     supervisor.start("/usr/local/bin/onedrive", ["--monitor"]).await?;
//!     println!("running as {:?}", supervisor.process_id());
//!
//!     supervisor.restart().await?;
//!     supervisor.terminate().await?;
//!     Ok(())
//! }
//! ```

mod error;
mod process;

pub use {
    error::ProcessError,
    error::Result as CoreResult,
    process::{
        EventSink, LaunchSpec, LogLine, OutputSource, ProcessState, ProcessSupervisor,
        StatusEvent, SupervisorConfig, SupervisorEvent,
    },
};
