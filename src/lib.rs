/*!
 * Mountwatch Library
 * Mount table change detection exposed as a library
 *
 * A registered notification backend wakes the monitor, the mount table is
 * reloaded and diffed by target path, and `MOUNTED` / `UNMOUNTED` events
 * are published to a sink.
 */

pub mod config;
pub mod core;
pub mod events;
pub mod monitor;
pub mod output;
pub mod table;
pub mod telemetry;

// Re-exports
pub use config::MonitorConfig;
pub use self::core::errors::*;
pub use self::core::types::{EventKind, MountEvent, MountRecord};
pub use events::{platform_name, Backend, BackendKind, EventSource, WaitOutcome, WatchPaths};
pub use monitor::{
    EventSink, Monitor, MonitorHandle, MonitorState, MonitorStats, Report, Step, StopFlag,
};
pub use output::{render, OutputFormat};
pub use table::{compare, MountTableSource, ProcMountsSource, Snapshot, SystemTable};
pub use telemetry::init_tracing;
