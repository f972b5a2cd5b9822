/*!
 * Event Source Traits
 * Platform-agnostic abstraction over mount change notifications
 */

use crate::core::errors::WaitResult;
use std::time::Duration;

/// How a single wait resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Something mount-related happened; the table should be reloaded
    Changed,
    /// The timeout expired, or nothing of interest was delivered
    TimedOut,
    /// A signal interrupted the wait; retry
    Interrupted,
}

/// A registered notification backend
///
/// Registration happens when the backend is constructed, so a live value
/// always holds an armed watch until `release` is called.
pub trait EventSource {
    /// Block until a change is signalled or `timeout` expires.
    /// `None` blocks for as long as the backend allows.
    fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Heuristic backends ask the monitor to dump the whole table after each wake
    fn dumps_table_on_wake(&self) -> bool {
        false
    }

    /// Release the OS resources. Idempotent.
    fn release(&mut self) {}
}

impl<T: EventSource + ?Sized> EventSource for Box<T> {
    fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome> {
        (**self).wait_for_change(timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dumps_table_on_wake(&self) -> bool {
        (**self).dumps_table_on_wake()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
