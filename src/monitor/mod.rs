/*!
 * Monitor Module
 * The wait / reload / diff loop and its thread wrapper
 */

mod handle;
mod machine;
mod sink;
mod state;

pub use handle::MonitorHandle;
pub use machine::{Monitor, Step, DEFAULT_WAIT_TIMEOUT};
pub use sink::{EventSink, Report};
pub use state::{MonitorState, MonitorStats, StopFlag};
