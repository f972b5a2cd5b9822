/*!
 * Monitor State Machine Tests
 * Wait / reload / diff cycles against scripted backends and tables
 */

use crate::support::{base_table, rec, unavailable, ScriptedSource, ScriptedTable};
use mockall::mock;
use mountwatch::{
    EventSource, Monitor, MonitorError, MonitorState, MountEvent, Report, SetupError, Step,
    StopFlag, WaitError, WaitOutcome, WaitResult,
};
use nix::errno::Errno;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::time::Duration;

mock! {
    pub Source {}

    impl EventSource for Source {
        fn wait_for_change(&mut self, timeout: Option<Duration>) -> WaitResult<WaitOutcome>;
        fn name(&self) -> &'static str;
        fn dumps_table_on_wake(&self) -> bool;
        fn release(&mut self);
    }
}

fn events(reports: &[Report]) -> Vec<MountEvent> {
    reports
        .iter()
        .filter_map(|r| match r {
            Report::Event(event) => Some(event.clone()),
            Report::Table(_) => None,
        })
        .collect()
}

#[test]
fn test_start_retains_initial_table() {
    let monitor = Monitor::start(
        ScriptedSource::new(vec![]),
        ScriptedTable::new(vec![Ok(base_table())]),
    )
    .unwrap();

    assert_eq!(monitor.state(), MonitorState::Armed);
    assert_eq!(monitor.previous().unwrap().len(), 2);
    assert_eq!(monitor.backend_name(), "scripted");
}

#[test]
fn test_start_failure_releases_backend() {
    let source = ScriptedSource::new(vec![]);
    let released = source.released();

    let result = Monitor::start(source, ScriptedTable::new(vec![unavailable()]));

    assert!(matches!(result, Err(SetupError::InitialLoad(_))));
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_proc_mount_reported() {
    let mut mounted = base_table();
    mounted.push(rec("proc", "/proc", "proc"));

    let mut monitor = Monitor::start(
        ScriptedSource::new(vec![Ok(WaitOutcome::Changed)]),
        ScriptedTable::new(vec![Ok(base_table()), Ok(mounted)]),
    )
    .unwrap();

    let mut sink: Vec<Report> = Vec::new();
    let step = monitor.step(&mut sink).unwrap();

    assert_eq!(step, Step::Reloaded { mounted: 1, unmounted: 0 });
    assert_eq!(
        sink,
        vec![Report::Event(MountEvent::Mounted(rec("proc", "/proc", "proc")))]
    );
    assert!(monitor.previous().unwrap().contains("/proc"));
    assert_eq!(monitor.state(), MonitorState::Armed);
}

#[test]
fn test_tmp_unmount_reported() {
    let mut monitor = Monitor::start(
        ScriptedSource::new(vec![Ok(WaitOutcome::Changed)]),
        ScriptedTable::new(vec![Ok(base_table()), Ok(vec![rec("/dev/sda1", "/", "ext4")])]),
    )
    .unwrap();

    let mut sink: Vec<Report> = Vec::new();
    monitor.step(&mut sink).unwrap();

    let lines: Vec<String> = events(&sink).iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec!["UNMOUNTED: tmpfs mounted at /tmp (type: tmpfs)"]);
}

#[test]
fn test_reload_failure_is_not_an_empty_table() {
    let mut monitor = Monitor::start(
        ScriptedSource::new(vec![Ok(WaitOutcome::Changed), Ok(WaitOutcome::Changed)]),
        ScriptedTable::new(vec![Ok(base_table()), unavailable(), Ok(base_table())]),
    )
    .unwrap();

    let mut sink: Vec<Report> = Vec::new();
    assert_eq!(monitor.step(&mut sink).unwrap(), Step::ReloadFailed);
    assert!(sink.is_empty());
    assert_eq!(monitor.previous().unwrap().len(), 2);

    assert_eq!(
        monitor.step(&mut sink).unwrap(),
        Step::Reloaded { mounted: 0, unmounted: 0 }
    );
    assert!(sink.is_empty());
    assert_eq!(monitor.stats().reload_failures, 1);
    assert_eq!(monitor.stats().reloads, 1);
}

#[test]
fn test_timeout_and_interrupt_are_idle() {
    let table = ScriptedTable::new(vec![Ok(base_table())]);
    let loads = table.count();
    let mut monitor = Monitor::start(
        ScriptedSource::new(vec![Ok(WaitOutcome::TimedOut), Ok(WaitOutcome::Interrupted)]),
        table,
    )
    .unwrap();

    let mut sink: Vec<Report> = Vec::new();
    assert_eq!(monitor.step(&mut sink).unwrap(), Step::Idle);
    assert_eq!(monitor.step(&mut sink).unwrap(), Step::Idle);

    assert!(sink.is_empty());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.stats().timeouts, 1);
    assert_eq!(monitor.stats().interrupts, 1);
}

#[test]
fn test_fatal_wait_error_closes_monitor() {
    let source = ScriptedSource::new(vec![Err(WaitError::Failed {
        backend: "scripted",
        source: Errno::EBADF,
    })]);
    let released = source.released();
    let mut monitor =
        Monitor::start(source, ScriptedTable::new(vec![Ok(base_table())])).unwrap();

    let mut sink: Vec<Report> = Vec::new();
    let err = monitor.step(&mut sink).unwrap_err();

    assert!(matches!(err, MonitorError::Wait(WaitError::Failed { .. })));
    assert_eq!(monitor.state(), MonitorState::Closed);
    assert!(monitor.previous().is_none());
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_closed_monitor_rejects_steps() {
    let mut monitor = Monitor::start(
        ScriptedSource::new(vec![]),
        ScriptedTable::new(vec![Ok(base_table())]),
    )
    .unwrap();

    monitor.shutdown();
    monitor.shutdown();

    let mut sink: Vec<Report> = Vec::new();
    assert!(matches!(monitor.step(&mut sink), Err(MonitorError::Closed)));
}

#[test]
fn test_stop_during_wait_skips_reload() {
    let stop = StopFlag::new();
    let requested = stop.clone();

    let mut source = MockSource::new();
    source.expect_name().return_const("mock");
    source
        .expect_wait_for_change()
        .times(1)
        .returning(move |_| {
            requested.request();
            Ok(WaitOutcome::Changed)
        });
    source.expect_dumps_table_on_wake().never();
    source.expect_release().times(1).return_const(());

    let table = ScriptedTable::new(vec![Ok(base_table()), Ok(vec![])]);
    let loads = table.count();
    let mut monitor = Monitor::start(source, table).unwrap().with_stop_flag(stop);

    let mut sink: Vec<Report> = Vec::new();
    assert_eq!(monitor.step(&mut sink).unwrap(), Step::Stopped);

    assert!(sink.is_empty());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.state(), MonitorState::Closed);
}

#[test]
fn test_wait_timeout_is_passed_through() {
    let mut source = MockSource::new();
    source.expect_name().return_const("mock");
    source
        .expect_wait_for_change()
        .withf(|timeout| *timeout == Some(Duration::from_millis(250)))
        .times(1)
        .returning(|_| Ok(WaitOutcome::TimedOut));
    source.expect_release().times(1).return_const(());

    let mut monitor = Monitor::start(source, ScriptedTable::new(vec![Ok(base_table())]))
        .unwrap()
        .with_timeout(Some(Duration::from_millis(250)));

    let mut sink: Vec<Report> = Vec::new();
    assert_eq!(monitor.step(&mut sink).unwrap(), Step::Idle);
}

#[test]
fn test_heuristic_backend_dumps_table_after_wake() {
    let mut grown = base_table();
    grown.push(rec("devfs", "/dev", "devfs"));

    let mut monitor = Monitor::start(
        ScriptedSource::new(vec![Ok(WaitOutcome::Changed)]).heuristic(),
        ScriptedTable::new(vec![Ok(base_table()), Ok(grown)]),
    )
    .unwrap();

    let mut sink: Vec<Report> = Vec::new();
    monitor.step(&mut sink).unwrap();

    assert_eq!(sink.len(), 2);
    assert_eq!(
        sink[0],
        Report::Event(MountEvent::Mounted(rec("devfs", "/dev", "devfs")))
    );
    match &sink[1] {
        Report::Table(snapshot) => assert_eq!(snapshot.len(), 3),
        other => panic!("expected table dump, got {:?}", other),
    }
}

#[test]
fn test_run_announces_then_stops() {
    let stop = StopFlag::new();
    let mut grown = base_table();
    grown.push(rec("proc", "/proc", "proc"));

    let monitor = Monitor::start(
        ScriptedSource::new(vec![Ok(WaitOutcome::Changed), Ok(WaitOutcome::TimedOut)])
            .stop_when_done(stop.clone()),
        ScriptedTable::new(vec![Ok(base_table()), Ok(grown)]),
    )
    .unwrap()
    .with_stop_flag(stop);

    let mut sink: Vec<Report> = Vec::new();
    let stats = monitor.run(&mut sink).unwrap();

    assert!(matches!(&sink[0], Report::Table(snapshot) if snapshot.len() == 2));
    assert_eq!(
        events(&sink),
        vec![MountEvent::Mounted(rec("proc", "/proc", "proc"))]
    );
    assert_eq!(stats.wakes, 1);
    assert_eq!(stats.mounted, 1);
    assert_eq!(stats.timeouts, 1);
}

#[test]
fn test_run_returns_fatal_error() {
    let monitor = Monitor::start(
        ScriptedSource::new(vec![
            Ok(WaitOutcome::TimedOut),
            Err(WaitError::Rearm {
                backend: "scripted",
                source: Errno::ENOENT,
            }),
        ]),
        ScriptedTable::new(vec![Ok(base_table())]),
    )
    .unwrap();

    let mut sink: Vec<Report> = Vec::new();
    let err = monitor.run(&mut sink).unwrap_err();
    assert!(matches!(err, MonitorError::Wait(WaitError::Rearm { .. })));
}
