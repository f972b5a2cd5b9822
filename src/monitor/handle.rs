/*!
 * Monitor Handle
 * Runs a monitor on a dedicated thread and forwards its reports
 */

use super::machine::Monitor;
use super::sink::Report;
use super::state::{MonitorStats, StopFlag};
use crate::core::errors::{MonitorError, MonitorResult};
use crate::events::EventSource;
use crate::table::MountTableSource;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

const THREAD_NAME: &str = "mountwatch";

/// Owner side of a monitor running on its own thread
///
/// The backend wait is blocking, so the loop never runs on an async
/// executor. Reports arrive over a flume channel that supports both
/// blocking and async receivers.
pub struct MonitorHandle {
    stop: StopFlag,
    reports: flume::Receiver<Report>,
    stats: Arc<Mutex<MonitorStats>>,
    thread: Option<JoinHandle<MonitorResult<MonitorStats>>>,
}

impl MonitorHandle {
    pub fn spawn<E, T>(monitor: Monitor<E, T>) -> io::Result<Self>
    where
        E: EventSource + Send + 'static,
        T: MountTableSource + Send + 'static,
    {
        let stats = Arc::new(Mutex::new(MonitorStats::default()));
        let monitor = monitor.with_shared_stats(Arc::clone(&stats));
        let stop = monitor.stop_flag();
        let (mut tx, rx) = flume::unbounded();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let result = monitor.run(&mut tx);
                match &result {
                    Ok(_) => info!("monitor thread finished"),
                    Err(e) => error!(error = %e, "monitor thread failed"),
                }
                result
            })?;

        Ok(Self {
            stop,
            reports: rx,
            stats,
            thread: Some(thread),
        })
    }

    /// Receiving end of the report channel; disconnects when the loop exits
    pub fn reports(&self) -> flume::Receiver<Report> {
        self.reports.clone()
    }

    /// Request shutdown; takes effect when the current wait returns
    pub fn stop(&self) {
        self.stop.request();
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Counters as of the last completed step
    pub fn stats(&self) -> MonitorStats {
        self.stats.lock().clone()
    }

    /// Wait for the loop to exit and return its final counters
    pub fn join(mut self) -> MonitorResult<MonitorStats> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| MonitorError::Panicked)?,
            None => Err(MonitorError::Closed),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop.request();
            let _ = thread.join();
        }
    }
}
