/*!
 * Monitor State
 * Lifecycle states, cooperative stop flag and counters
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of a monitor loop
///
/// ```text
/// Init -> Armed -> Waiting -> Reloading -> Diffing -> Armed
///                          -> Armed            (timeout / interrupt)
///                          -> ShuttingDown -> Closed
/// ```
///
/// Any live state may move to `ShuttingDown`, so a monitor dropped while
/// unwinding out of a reload still releases its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Init,
    Armed,
    Waiting,
    Reloading,
    Diffing,
    ShuttingDown,
    Closed,
}

impl MonitorState {
    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(self, next: MonitorState) -> bool {
        use MonitorState::*;
        matches!(
            (self, next),
            (Init, Armed)
                | (Init, ShuttingDown)
                | (Armed, Waiting)
                | (Armed, ShuttingDown)
                | (Waiting, Armed)
                | (Waiting, Reloading)
                | (Waiting, ShuttingDown)
                | (Reloading, Diffing)
                | (Reloading, Armed)
                | (Reloading, ShuttingDown)
                | (Diffing, Armed)
                | (Diffing, ShuttingDown)
                | (ShuttingDown, Closed)
        )
    }

    #[inline]
    pub fn is_closed(self) -> bool {
        self == MonitorState::Closed
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Init => "init",
            MonitorState::Armed => "armed",
            MonitorState::Waiting => "waiting",
            MonitorState::Reloading => "reloading",
            MonitorState::Diffing => "diffing",
            MonitorState::ShuttingDown => "shutting_down",
            MonitorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Cooperative shutdown request, observed after each wait returns
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loop counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub wakes: u64,
    pub timeouts: u64,
    pub interrupts: u64,
    pub reloads: u64,
    pub reload_failures: u64,
    pub mounted: u64,
    pub unmounted: u64,
}
