/*!
 * Differ Tests
 * Target-keyed set difference between two snapshots
 */

use mountwatch::{compare, EventKind, MountEvent, MountRecord, Snapshot};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;

const FSTYPES: [&str; 4] = ["ext4", "tmpfs", "proc", "nfs"];

fn rec(source: &str, target: &str, fstype: &str) -> MountRecord {
    MountRecord::new(source, target, fstype)
}

fn keys(snapshot: &Snapshot) -> HashSet<String> {
    snapshot.targets().map(str::to_string).collect()
}

fn targets_of(events: &[MountEvent], kind: EventKind) -> HashSet<String> {
    events
        .iter()
        .filter(|e| e.kind() == kind)
        .map(|e| e.target().to_string())
        .collect()
}

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec((0u8..24, 0usize..FSTYPES.len()), 0..24).prop_map(|entries| {
        Snapshot::from_records(entries.into_iter().map(|(mount, fstype)| {
            rec(
                &format!("/dev/disk{}", mount),
                &format!("/mnt/{}", mount),
                FSTYPES[fstype],
            )
        }))
    })
}

proptest! {
    #[test]
    fn prop_events_match_key_differences(a in snapshot_strategy(), b in snapshot_strategy()) {
        let events = compare(&a, &b);
        let (ka, kb) = (keys(&a), keys(&b));

        let added: HashSet<String> = kb.difference(&ka).cloned().collect();
        let removed: HashSet<String> = ka.difference(&kb).cloned().collect();

        prop_assert_eq!(targets_of(&events, EventKind::Mounted), added);
        prop_assert_eq!(targets_of(&events, EventKind::Unmounted), removed);
    }

    #[test]
    fn prop_identical_snapshots_produce_nothing(a in snapshot_strategy()) {
        prop_assert!(compare(&a, &a).is_empty());
    }

    #[test]
    fn prop_applying_events_reaches_current(a in snapshot_strategy(), b in snapshot_strategy()) {
        let mut live = keys(&a);
        for event in compare(&a, &b) {
            match event {
                MountEvent::Mounted(record) => {
                    prop_assert!(live.insert(record.target));
                }
                MountEvent::Unmounted(record) => {
                    prop_assert!(live.remove(&record.target));
                }
            }
        }
        prop_assert_eq!(live, keys(&b));
    }

    #[test]
    fn prop_mounted_precede_unmounted(a in snapshot_strategy(), b in snapshot_strategy()) {
        let kinds: Vec<EventKind> = compare(&a, &b).iter().map(MountEvent::kind).collect();
        let first_unmounted = kinds
            .iter()
            .position(|k| *k == EventKind::Unmounted)
            .unwrap_or(kinds.len());
        prop_assert!(kinds[first_unmounted..].iter().all(|k| *k == EventKind::Unmounted));
    }
}

#[test]
fn test_proc_mount_detected() {
    let previous = Snapshot::from_records(vec![rec("/dev/sda1", "/", "ext4")]);
    let current = Snapshot::from_records(vec![
        rec("/dev/sda1", "/", "ext4"),
        rec("proc", "/proc", "proc"),
    ]);

    let events = compare(&previous, &current);
    assert_eq!(events, vec![MountEvent::Mounted(rec("proc", "/proc", "proc"))]);
    assert_eq!(
        events[0].to_string(),
        "MOUNTED: proc mounted at /proc (type: proc)"
    );
}

#[test]
fn test_tmp_unmount_reports_previous_record() {
    let previous = Snapshot::from_records(vec![
        rec("/dev/sda1", "/", "ext4"),
        rec("tmpfs", "/tmp", "tmpfs"),
    ]);
    let current = Snapshot::from_records(vec![rec("/dev/sda1", "/", "ext4")]);

    let events = compare(&previous, &current);
    assert_eq!(events, vec![MountEvent::Unmounted(rec("tmpfs", "/tmp", "tmpfs"))]);
    assert_eq!(
        events[0].to_string(),
        "UNMOUNTED: tmpfs mounted at /tmp (type: tmpfs)"
    );
}

#[test]
fn test_remount_with_new_fstype_is_silent() {
    let previous = Snapshot::from_records(vec![rec("/dev/sdb1", "/data", "ext4")]);
    let current = Snapshot::from_records(vec![rec("server:/export", "/data", "nfs")]);
    assert!(compare(&previous, &current).is_empty());
}

#[test]
fn test_event_order_follows_snapshots() {
    let previous = Snapshot::from_records(vec![
        rec("a", "/a", "tmpfs"),
        rec("b", "/b", "tmpfs"),
        rec("keep", "/keep", "ext4"),
    ]);
    let current = Snapshot::from_records(vec![
        rec("keep", "/keep", "ext4"),
        rec("y", "/y", "tmpfs"),
        rec("x", "/x", "tmpfs"),
    ]);

    let targets: Vec<(EventKind, String)> = compare(&previous, &current)
        .into_iter()
        .map(|e| (e.kind(), e.target().to_string()))
        .collect();

    assert_eq!(
        targets,
        vec![
            (EventKind::Mounted, "/y".to_string()),
            (EventKind::Mounted, "/x".to_string()),
            (EventKind::Unmounted, "/a".to_string()),
            (EventKind::Unmounted, "/b".to_string()),
        ]
    );
}

#[test]
fn test_from_empty_everything_is_mounted() {
    let current = Snapshot::from_records(vec![
        rec("/dev/sda1", "/", "ext4"),
        rec("proc", "/proc", "proc"),
    ]);
    let events = compare(&Snapshot::empty(), &current);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind() == EventKind::Mounted));
}
