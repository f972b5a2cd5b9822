/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 *
 * Only `SetupError` and `WaitError` are fatal. Everything else is absorbed
 * by the monitor loop and surfaced as log output.
 */

use miette::Diagnostic;
use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while bringing the monitor up. Always fatal.
#[derive(Error, Debug, Diagnostic)]
pub enum SetupError {
    #[error("Unsupported platform: {0}")]
    #[diagnostic(
        code(setup::unsupported),
        help("Mount monitoring is available on Linux, FreeBSD and macOS.")
    )]
    Unsupported(String),

    #[error("Failed to register {backend} watch on {path}: {source}")]
    #[diagnostic(
        code(setup::register_failed),
        help("Check that the path exists and that the process may open it.")
    )]
    Register {
        backend: &'static str,
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("Initial mount table load failed: {0}")]
    #[diagnostic(transparent)]
    InitialLoad(#[from] ReloadError),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Non-retryable failures of a running backend
#[derive(Error, Debug, Diagnostic)]
pub enum WaitError {
    #[error("{backend} wait failed: {source}")]
    #[diagnostic(
        code(wait::failed),
        help("The notification descriptor is unusable. The monitor must be restarted.")
    )]
    Failed {
        backend: &'static str,
        #[source]
        source: Errno,
    },

    #[error("{backend} failed to re-arm its one-shot watch: {source}")]
    #[diagnostic(
        code(wait::rearm_failed),
        help("Without re-registration further changes would go undetected.")
    )]
    Rearm {
        backend: &'static str,
        #[source]
        source: Errno,
    },

    #[error("{backend} failed to acknowledge a pending notification: {source}")]
    #[diagnostic(
        code(wait::acknowledge_failed),
        help("An unacknowledged notification is re-delivered on every wait.")
    )]
    Acknowledge {
        backend: &'static str,
        #[source]
        source: Errno,
    },

    #[error("Watch on {path} was removed by the kernel")]
    #[diagnostic(code(wait::watch_removed))]
    WatchRemoved { path: PathBuf },
}

/// The mount table could not be read. Non-fatal at runtime.
#[derive(Error, Debug, Diagnostic)]
pub enum ReloadError {
    #[error("Failed to read mount table {path}: {source}")]
    #[diagnostic(code(reload::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed mount table entry at line {line}: {content:?}")]
    #[diagnostic(
        code(reload::malformed),
        help("Each entry needs at least source, target and filesystem type fields.")
    )]
    Malformed { line: usize, content: String },

    #[error("Mount table unavailable: {0}")]
    #[diagnostic(code(reload::unavailable))]
    Unavailable(String),
}

/// A record in an inotify read buffer could not be decoded.
/// The rest of the buffer is dropped; parsing resumes with the next read.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum RecordParseError {
    #[error("Event record at offset {offset} declares a {declared} byte name (limit {limit})")]
    #[diagnostic(code(record::name_too_long))]
    NameTooLong {
        offset: usize,
        declared: u32,
        limit: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid, expected {expected}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Errors returned by the monitor loop
#[derive(Error, Debug, Diagnostic)]
pub enum MonitorError {
    #[error("Setup error: {0}")]
    #[diagnostic(transparent)]
    Setup(#[from] SetupError),

    #[error("Wait error: {0}")]
    #[diagnostic(transparent)]
    Wait(#[from] WaitError),

    #[error("Monitor is closed")]
    #[diagnostic(
        code(monitor::closed),
        help("A closed monitor has released its watch; start a new one.")
    )]
    Closed,

    #[error("Monitor thread panicked")]
    #[diagnostic(code(monitor::panicked))]
    Panicked,
}

pub type SetupResult<T> = Result<T, SetupError>;
pub type WaitResult<T> = Result<T, WaitError>;
pub type ReloadResult<T> = Result<T, ReloadError>;
pub type MonitorResult<T> = Result<T, MonitorError>;
