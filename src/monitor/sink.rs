/*!
 * Event Sinks
 * Where a monitor publishes detected changes and table dumps
 */

use crate::core::types::MountEvent;
use crate::table::Snapshot;
use tracing::debug;

/// Everything a monitor publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Event(MountEvent),
    /// Full table, at startup and after wakes of heuristic backends
    Table(Snapshot),
}

pub trait EventSink {
    fn on_event(&mut self, event: &MountEvent);

    fn on_table(&mut self, snapshot: &Snapshot);
}

/// One-way channel to another thread or task
impl EventSink for flume::Sender<Report> {
    fn on_event(&mut self, event: &MountEvent) {
        if self.send(Report::Event(event.clone())).is_err() {
            debug!("report receiver dropped, event discarded");
        }
    }

    fn on_table(&mut self, snapshot: &Snapshot) {
        if self.send(Report::Table(snapshot.clone())).is_err() {
            debug!("report receiver dropped, table dump discarded");
        }
    }
}

/// In-memory recording, mostly for tests and embedding
impl EventSink for Vec<Report> {
    fn on_event(&mut self, event: &MountEvent) {
        self.push(Report::Event(event.clone()));
    }

    fn on_table(&mut self, snapshot: &Snapshot) {
        self.push(Report::Table(snapshot.clone()));
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn on_event(&mut self, event: &MountEvent) {
        (**self).on_event(event)
    }

    fn on_table(&mut self, snapshot: &Snapshot) {
        (**self).on_table(snapshot)
    }
}
