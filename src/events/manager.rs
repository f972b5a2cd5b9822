/*!
 * Backend Manager
 * Platform-aware selection of the notification backend
 */

use super::traits::{EventSource, WaitOutcome};
use crate::core::errors::{ConfigError, SetupError, SetupResult, WaitResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[cfg(target_os = "linux")]
use super::inotify::{InotifyReader, PollingFileBackend};
#[cfg(target_os = "linux")]
use super::kernel::{KernelMonitorBackend, MountinfoChannel};
#[cfg(any(target_os = "freebsd", target_os = "macos"))]
use super::kqueue::{EdgeTriggeredProxyBackend, KqueueWatch};

/// Which notification mechanism to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Best mechanism for the host
    #[default]
    Auto,
    /// Kernel mount-change channel (Linux mountinfo)
    KernelMonitor,
    /// Inotify modify watch on the mounts file
    PollingFile,
    /// One-shot kqueue vnode watch on a proxy node
    EdgeTriggered,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "kernel" | "mountinfo" => Ok(BackendKind::KernelMonitor),
            "inotify" | "file" => Ok(BackendKind::PollingFile),
            "kqueue" | "proxy" => Ok(BackendKind::EdgeTriggered),
            _ => Err(ConfigError::InvalidValue {
                var: "MOUNTWATCH_BACKEND",
                value: s.to_string(),
                expected: "auto, kernel, inotify or kqueue",
            }),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Auto => "auto",
            BackendKind::KernelMonitor => "kernel",
            BackendKind::PollingFile => "inotify",
            BackendKind::EdgeTriggered => "kqueue",
        };
        f.write_str(name)
    }
}

/// Paths each backend registers on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchPaths {
    pub mounts_file: PathBuf,
    pub mountinfo_file: PathBuf,
    pub proxy_node: PathBuf,
}

impl Default for WatchPaths {
    fn default() -> Self {
        Self {
            mounts_file: PathBuf::from(super::inotify::DEFAULT_MOUNTS_FILE),
            mountinfo_file: PathBuf::from(super::kernel::DEFAULT_MOUNTINFO_FILE),
            proxy_node: PathBuf::from(super::kqueue::DEFAULT_PROXY_PATH),
        }
    }
}

/// Display name for an `std::env::consts::OS` value with a backend
pub fn platform_name(os: &str) -> Option<&'static str> {
    match os {
        "linux" => Some("Linux"),
        "freebsd" => Some("FreeBSD"),
        "macos" => Some("macOS"),
        _ => None,
    }
}

/// Resolve `Auto` to the concrete mechanism for this host
pub fn resolve_kind(kind: BackendKind) -> SetupResult<BackendKind> {
    if kind != BackendKind::Auto {
        return Ok(kind);
    }

    if cfg!(target_os = "linux") {
        Ok(BackendKind::KernelMonitor)
    } else if cfg!(any(target_os = "freebsd", target_os = "macos")) {
        Ok(BackendKind::EdgeTriggered)
    } else {
        Err(SetupError::Unsupported(std::env::consts::OS.to_string()))
    }
}

/// The registered backend, chosen once at startup
pub enum Backend {
    #[cfg(target_os = "linux")]
    KernelMonitor(KernelMonitorBackend<MountinfoChannel>),
    #[cfg(target_os = "linux")]
    PollingFile(PollingFileBackend<InotifyReader>),
    #[cfg(any(target_os = "freebsd", target_os = "macos"))]
    EdgeTriggered(EdgeTriggeredProxyBackend<KqueueWatch>),
}

macro_rules! dispatch {
    ($self:expr, $backend:ident => $body:expr) => {
        match $self {
            #[cfg(target_os = "linux")]
            Backend::KernelMonitor($backend) => $body,
            #[cfg(target_os = "linux")]
            Backend::PollingFile($backend) => $body,
            #[cfg(any(target_os = "freebsd", target_os = "macos"))]
            Backend::EdgeTriggered($backend) => $body,
            #[allow(unreachable_patterns)]
            _ => unreachable!("no notification backend exists on this platform"),
        }
    };
}

impl Backend {
    /// Register the requested backend
    pub fn open(kind: BackendKind, paths: &WatchPaths) -> SetupResult<Self> {
        let kind = resolve_kind(kind)?;
        let backend = Self::open_resolved(kind, paths)?;
        info!(backend = backend.name(), "notification backend registered");
        Ok(backend)
    }

    fn open_resolved(
        kind: BackendKind,
        #[cfg_attr(
            not(any(target_os = "linux", target_os = "freebsd", target_os = "macos")),
            allow(unused_variables)
        )]
        paths: &WatchPaths,
    ) -> SetupResult<Self> {
        match kind {
            #[cfg(target_os = "linux")]
            BackendKind::KernelMonitor => Ok(Backend::KernelMonitor(KernelMonitorBackend::open(
                &paths.mountinfo_file,
            )?)),
            #[cfg(target_os = "linux")]
            BackendKind::PollingFile => Ok(Backend::PollingFile(PollingFileBackend::open(
                &paths.mounts_file,
            )?)),
            #[cfg(any(target_os = "freebsd", target_os = "macos"))]
            BackendKind::EdgeTriggered => Ok(Backend::EdgeTriggered(
                EdgeTriggeredProxyBackend::open(&paths.proxy_node)?,
            )),
            other => Err(SetupError::Unsupported(format!(
                "{} backend is not available on {}",
                other,
                std::env::consts::OS
            ))),
        }
    }
}

impl EventSource for Backend {
    fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome> {
        dispatch!(self, backend => backend.wait_for_change(timeout))
    }

    fn name(&self) -> &'static str {
        dispatch!(self, backend => backend.name())
    }

    fn dumps_table_on_wake(&self) -> bool {
        dispatch!(self, backend => backend.dumps_table_on_wake())
    }

    fn release(&mut self) {
        dispatch!(self, backend => backend.release())
    }
}
