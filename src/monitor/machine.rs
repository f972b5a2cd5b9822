/*!
 * Mount Monitor
 * Wait, reload, diff, emit
 *
 * Single-threaded and cooperative: the only blocking point is the backend
 * wait. Events for a reload are emitted before the next wait begins.
 */

use super::sink::EventSink;
use super::state::{MonitorState, MonitorStats, StopFlag};
use crate::core::errors::{MonitorError, MonitorResult, SetupResult};
use crate::core::types::EventKind;
use crate::events::{EventSource, WaitOutcome};
use crate::table::{compare, MountTableSource, Snapshot};
use crate::telemetry::{monitor_span, ReloadSpan};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn, Span};

/// Default wait per cycle; bounds how long a stop request can go unnoticed
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// What one call to [`Monitor::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Timed out or interrupted; nothing to do
    Idle,
    /// Table reloaded and diffed
    Reloaded { mounted: usize, unmounted: usize },
    /// Reload failed; previous snapshot kept
    ReloadFailed,
    /// Stop was requested; the monitor is now closed
    Stopped,
}

pub struct Monitor<E: EventSource, T: MountTableSource> {
    source: E,
    table: T,
    previous: Option<Snapshot>,
    state: MonitorState,
    timeout: Option<Duration>,
    stop: StopFlag,
    stats: MonitorStats,
    shared_stats: Option<Arc<Mutex<MonitorStats>>>,
    span: Span,
}

impl<E: EventSource, T: MountTableSource> Monitor<E, T> {
    /// Take ownership of a registered backend and perform the first load
    ///
    /// On failure the backend is released before the error is returned.
    pub fn start(mut source: E, mut table: T) -> SetupResult<Self> {
        let span = monitor_span(source.name());

        let initial = {
            let _entered = span.enter();
            match Snapshot::load(&mut table) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(error = %e, "initial mount table load failed");
                    source.release();
                    return Err(e.into());
                }
            }
        };

        let mut monitor = Self {
            source,
            table,
            previous: Some(initial),
            state: MonitorState::Init,
            timeout: Some(DEFAULT_WAIT_TIMEOUT),
            stop: StopFlag::new(),
            stats: MonitorStats::default(),
            shared_stats: None,
            span,
        };
        monitor.transition(MonitorState::Armed);

        {
            let _entered = monitor.span.enter();
            let mounts = monitor.previous.as_ref().map_or(0, Snapshot::len);
            info!(mounts, "monitor armed");
        }
        Ok(monitor)
    }

    /// Per-wait timeout; `None` blocks for as long as the backend allows
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Observe an externally owned stop flag
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Publish counters to a shared cell after every step
    pub fn with_shared_stats(mut self, shared: Arc<Mutex<MonitorStats>>) -> Self {
        *shared.lock() = self.stats.clone();
        self.shared_stats = Some(shared);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// The retained snapshot; `None` once closed
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn backend_name(&self) -> &'static str {
        self.source.name()
    }

    /// Publish the retained table as a dump
    pub fn announce<K: EventSink + ?Sized>(&self, sink: &mut K) {
        if let Some(snapshot) = &self.previous {
            sink.on_table(snapshot);
        }
    }

    /// Run one wait cycle
    pub fn step<K: EventSink + ?Sized>(&mut self, sink: &mut K) -> MonitorResult<Step> {
        if self.state.is_closed() {
            return Err(MonitorError::Closed);
        }

        let span = self.span.clone();
        let _entered = span.enter();

        self.transition(MonitorState::Waiting);
        let outcome = match self.source.wait_for_change(self.timeout) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "fatal wait error, shutting down");
                self.shutdown();
                return Err(e.into());
            }
        };

        if self.stop.is_requested() {
            info!("stop requested");
            self.shutdown();
            return Ok(Step::Stopped);
        }

        let step = match outcome {
            WaitOutcome::TimedOut => {
                self.stats.timeouts += 1;
                self.transition(MonitorState::Armed);
                Step::Idle
            }
            WaitOutcome::Interrupted => {
                self.stats.interrupts += 1;
                self.transition(MonitorState::Armed);
                Step::Idle
            }
            WaitOutcome::Changed => {
                self.stats.wakes += 1;
                debug!("mount table changed");
                self.reload(sink)
            }
        };

        self.publish_stats();
        Ok(step)
    }

    /// Loop until stopped or a fatal error; always ends closed
    pub fn run<K: EventSink + ?Sized>(mut self, sink: &mut K) -> MonitorResult<MonitorStats> {
        self.announce(sink);
        loop {
            if let Step::Stopped = self.step(sink)? {
                return Ok(self.stats.clone());
            }
        }
    }

    /// Release the backend and the retained snapshot. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state.is_closed() {
            return;
        }

        let span = self.span.clone();
        let _entered = span.enter();
        self.transition(MonitorState::ShuttingDown);
        self.source.release();
        self.previous = None;
        self.transition(MonitorState::Closed);

        let stats = &self.stats;
        info!(
            wakes = stats.wakes,
            reloads = stats.reloads,
            reload_failures = stats.reload_failures,
            mounted = stats.mounted,
            unmounted = stats.unmounted,
            "monitor closed"
        );
        self.publish_stats();
    }

    fn reload<K: EventSink + ?Sized>(&mut self, sink: &mut K) -> Step {
        self.transition(MonitorState::Reloading);

        let timer = ReloadSpan::new(self.source.name());
        let loaded = {
            let _entered = timer.enter();
            Snapshot::load(&mut self.table)
        };
        let current = match loaded {
            Ok(snapshot) => {
                timer.record_records(snapshot.len());
                snapshot
            }
            Err(e) => {
                // An unreadable table is not an empty table
                self.stats.reload_failures += 1;
                warn!(error = %e, "mount table reload failed, keeping previous snapshot");
                self.transition(MonitorState::Armed);
                return Step::ReloadFailed;
            }
        };
        self.stats.reloads += 1;

        self.transition(MonitorState::Diffing);
        let events = match &self.previous {
            Some(previous) => compare(previous, &current),
            None => compare(&Snapshot::empty(), &current),
        };

        let (mut mounted, mut unmounted) = (0, 0);
        for event in &events {
            match event.kind() {
                EventKind::Mounted => mounted += 1,
                EventKind::Unmounted => unmounted += 1,
            }
            info!(
                kind = ?event.kind(),
                mount_point = event.target(),
                fstype = %event.record().fstype,
                "mount change"
            );
            sink.on_event(event);
        }
        self.stats.mounted += mounted as u64;
        self.stats.unmounted += unmounted as u64;

        if self.source.dumps_table_on_wake() {
            sink.on_table(&current);
        }

        self.previous = Some(current);
        self.transition(MonitorState::Armed);
        Step::Reloaded { mounted, unmounted }
    }

    fn transition(&mut self, next: MonitorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        trace!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn publish_stats(&self) {
        if let Some(shared) = &self.shared_stats {
            *shared.lock() = self.stats.clone();
        }
    }
}

impl<E: EventSource, T: MountTableSource> Drop for Monitor<E, T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
