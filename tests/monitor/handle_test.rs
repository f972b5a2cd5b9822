/*!
 * Monitor Handle Tests
 * Running the loop on its own thread and draining the report channel
 */

use crate::support::{base_table, rec, ScriptedSource, ScriptedTable};
use mountwatch::{
    Monitor, MonitorError, MonitorHandle, MountEvent, MountRecord, Report, ReloadResult,
    WaitError, WaitOutcome,
};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_reports_flow_until_stopped() {
    let mut grown = base_table();
    grown.push(rec("proc", "/proc", "proc"));

    let source = ScriptedSource::new(vec![Ok(WaitOutcome::Changed)]).idle(Duration::from_millis(5));
    let released = source.released();
    let monitor = Monitor::start(source, ScriptedTable::new(vec![Ok(base_table()), Ok(grown)]))
        .unwrap();

    let handle = MonitorHandle::spawn(monitor).unwrap();
    let reports = handle.reports();

    let first = reports.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(matches!(first, Report::Table(ref snapshot) if snapshot.len() == 2));

    let second = reports.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(
        second,
        Report::Event(MountEvent::Mounted(rec("proc", "/proc", "proc")))
    );

    handle.stop();
    assert!(handle.stop_flag().is_requested());

    let stats = handle.join().unwrap();
    assert_eq!(stats.wakes, 1);
    assert_eq!(stats.mounted, 1);
    assert!(released.load(Ordering::SeqCst));

    // The sender is gone once the loop exits
    assert!(reports.recv_timeout(RECV_TIMEOUT).is_err());
}

#[test]
fn test_shared_stats_follow_the_loop() {
    let source = ScriptedSource::new(vec![Ok(WaitOutcome::Changed), Ok(WaitOutcome::Changed)])
        .idle(Duration::from_millis(5));
    let waits = source.waits();
    let monitor =
        Monitor::start(source, ScriptedTable::new(vec![Ok(base_table())])).unwrap();

    let handle = MonitorHandle::spawn(monitor).unwrap();
    while waits.load(Ordering::SeqCst) < 3 {
        std::thread::sleep(Duration::from_millis(1));
    }

    handle.stop();
    let live = handle.stats();
    assert_eq!(live.wakes, 2);
    assert_eq!(live.reloads, 2);

    let stats = handle.join().unwrap();
    assert_eq!(stats.wakes, 2);
}

#[test]
fn test_join_surfaces_fatal_error() {
    let source = ScriptedSource::new(vec![Err(WaitError::Failed {
        backend: "scripted",
        source: Errno::EIO,
    })]);
    let monitor =
        Monitor::start(source, ScriptedTable::new(vec![Ok(base_table())])).unwrap();

    let handle = MonitorHandle::spawn(monitor).unwrap();
    let reports = handle.reports();

    // Startup dump, then disconnect
    assert!(matches!(
        reports.recv_timeout(RECV_TIMEOUT).unwrap(),
        Report::Table(_)
    ));
    assert!(reports.recv_timeout(RECV_TIMEOUT).is_err());

    assert!(matches!(
        handle.join(),
        Err(MonitorError::Wait(WaitError::Failed { .. }))
    ));
}

#[test]
fn test_dropping_handle_stops_monitor() {
    let source = ScriptedSource::new(vec![]).idle(Duration::from_millis(5));
    let released = source.released();
    let monitor =
        Monitor::start(source, ScriptedTable::new(vec![Ok(base_table())])).unwrap();

    let handle = MonitorHandle::spawn(monitor).unwrap();
    drop(handle);

    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_panicking_table_reader_surfaces_as_panicked() {
    let source = ScriptedSource::new(vec![Ok(WaitOutcome::Changed)]).idle(Duration::from_millis(5));
    let released = source.released();

    let mut loads = 0;
    let table = move || -> ReloadResult<Vec<MountRecord>> {
        loads += 1;
        if loads > 1 {
            panic!("mount table reader crashed");
        }
        Ok(base_table())
    };
    let monitor = Monitor::start(source, table).unwrap();

    let handle = MonitorHandle::spawn(monitor).unwrap();
    assert!(matches!(handle.join(), Err(MonitorError::Panicked)));
    assert!(released.load(Ordering::SeqCst));
}
