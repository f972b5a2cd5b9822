/*!
 * Configuration
 * Environment-driven settings for the mountwatch binary
 *
 * The library core takes everything as arguments; only the binary reads
 * the environment.
 */

use crate::core::errors::ConfigError;
use crate::events::{inotify, kernel, kqueue, BackendKind, WatchPaths};
use crate::output::OutputFormat;
use crate::table::PROC_MOUNTS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_BACKEND: &str = "MOUNTWATCH_BACKEND";
pub const ENV_TIMEOUT_MS: &str = "MOUNTWATCH_TIMEOUT_MS";
pub const ENV_MOUNTS_PATH: &str = "MOUNTWATCH_MOUNTS_PATH";
pub const ENV_MOUNTINFO_PATH: &str = "MOUNTWATCH_MOUNTINFO_PATH";
pub const ENV_TABLE_PATH: &str = "MOUNTWATCH_TABLE_PATH";
pub const ENV_PROXY_PATH: &str = "MOUNTWATCH_PROXY_PATH";
pub const ENV_FORMAT: &str = "MOUNTWATCH_FORMAT";
pub const ENV_TRACE_JSON: &str = "MOUNTWATCH_TRACE_JSON";

const DEFAULT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub backend: BackendKind,
    /// Per-wait timeout; 0 blocks indefinitely
    pub timeout_ms: u64,
    pub mounts_path: PathBuf,
    pub mountinfo_path: PathBuf,
    pub table_path: PathBuf,
    pub proxy_path: PathBuf,
    pub format: OutputFormat,
    pub trace_json: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            mounts_path: PathBuf::from(inotify::DEFAULT_MOUNTS_FILE),
            mountinfo_path: PathBuf::from(kernel::DEFAULT_MOUNTINFO_FILE),
            table_path: PathBuf::from(PROC_MOUNTS),
            proxy_path: PathBuf::from(kqueue::DEFAULT_PROXY_PATH),
            format: OutputFormat::Text,
            trace_json: false,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and empty keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get(ENV_BACKEND) {
            config.backend = value.parse()?;
        }
        if let Some(value) = get(ENV_TIMEOUT_MS) {
            config.timeout_ms = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_TIMEOUT_MS,
                value: value.clone(),
                expected: "a non-negative number of milliseconds",
            })?;
        }
        if let Some(value) = get(ENV_MOUNTS_PATH) {
            config.mounts_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_MOUNTINFO_PATH) {
            config.mountinfo_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_TABLE_PATH) {
            config.table_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_PROXY_PATH) {
            config.proxy_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_FORMAT) {
            config.format = value.parse()?;
        }
        if let Some(value) = get(ENV_TRACE_JSON) {
            config.trace_json = parse_flag(ENV_TRACE_JSON, &value)?;
        }

        Ok(config)
    }

    /// Bound on each backend wait; `0` blocks until the next wake
    ///
    /// Without a bound a stop request is only observed after the next mount
    /// change, so on an idle host the binary needs a second Ctrl-C or
    /// SIGTERM to exit.
    pub fn wait_timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn watch_paths(&self) -> WatchPaths {
        WatchPaths {
            mounts_file: self.mounts_path.clone(),
            mountinfo_file: self.mountinfo_path.clone(),
            proxy_node: self.proxy_path.clone(),
        }
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}
