/*!
 * Core Types
 * Mount records and the events derived from them
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the mount table
///
/// `target` is the natural key: a mount namespace has at most one active
/// mount per target path at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountRecord {
    pub source: String,
    pub target: String,
    pub fstype: String,
}

impl MountRecord {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        fstype: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            fstype: fstype.into(),
        }
    }
}

/// Table dump form: `<source> on <target> type <fstype>`
impl fmt::Display for MountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} type {}", self.source, self.target, self.fstype)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Mounted,
    Unmounted,
}

/// A single detected change to the mount table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "mount", rename_all = "snake_case")]
pub enum MountEvent {
    Mounted(MountRecord),
    Unmounted(MountRecord),
}

impl MountEvent {
    #[inline]
    pub fn kind(&self) -> EventKind {
        match self {
            MountEvent::Mounted(_) => EventKind::Mounted,
            MountEvent::Unmounted(_) => EventKind::Unmounted,
        }
    }

    #[inline]
    pub fn record(&self) -> &MountRecord {
        match self {
            MountEvent::Mounted(record) | MountEvent::Unmounted(record) => record,
        }
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.record().target
    }

    pub fn into_record(self) -> MountRecord {
        match self {
            MountEvent::Mounted(record) | MountEvent::Unmounted(record) => record,
        }
    }
}

impl fmt::Display for MountEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind() {
            EventKind::Mounted => "MOUNTED",
            EventKind::Unmounted => "UNMOUNTED",
        };
        let record = self.record();
        write!(
            f,
            "{}: {} mounted at {} (type: {})",
            label, record.source, record.target, record.fstype
        )
    }
}
