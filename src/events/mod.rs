/*!
 * Change Notification Module
 * Cross-platform mount change detection with platform-specific backends
 */

pub mod inotify;
pub mod kernel;
pub mod kqueue;
mod manager;
#[cfg(target_os = "linux")]
mod poll;
mod traits;

pub use inotify::{EventBuffer, NotifyReader, PollingFileBackend, RawEvent};
pub use kernel::{ChangeChannel, KernelMonitorBackend};
pub use kqueue::{EdgeTriggeredProxyBackend, OneShotQueue};
pub use manager::{platform_name, resolve_kind, Backend, BackendKind, WatchPaths};
pub use traits::{EventSource, WaitOutcome};

#[cfg(target_os = "linux")]
pub use inotify::InotifyReader;
#[cfg(target_os = "linux")]
pub use kernel::MountinfoChannel;
#[cfg(any(target_os = "freebsd", target_os = "macos"))]
pub use kqueue::KqueueWatch;
