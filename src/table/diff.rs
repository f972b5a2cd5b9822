/*!
 * Snapshot Differ
 * Turns two mount tables into ordered mount/unmount events
 */

use super::snapshot::Snapshot;
use crate::core::types::MountEvent;

/// Compare two snapshots by target path
///
/// Emits `Mounted` for every target only in `current` (in `current` order),
/// then `Unmounted` for every target only in `previous` (in `previous`
/// order). A target present in both produces nothing, even when its source
/// or filesystem type changed.
pub fn compare(previous: &Snapshot, current: &Snapshot) -> Vec<MountEvent> {
    let mounted = current
        .iter()
        .filter(|record| !previous.contains(&record.target))
        .map(|record| MountEvent::Mounted(record.clone()));

    let unmounted = previous
        .iter()
        .filter(|record| !current.contains(&record.target))
        .map(|record| MountEvent::Unmounted(record.clone()));

    mounted.chain(unmounted).collect()
}
