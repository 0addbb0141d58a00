use integration_tests::{job, wait_until_idle, Workdir};
use packrat_core::{
    model::Status,
    schedule::{Minute, Schedule, TimeOfDay},
    store::JobStore,
};
use packrat_daemon::{scheduler::Scheduler, shutdown::Shutdown};
use std::time::Duration;
use time::macros::date;

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_run_nightly_job_and_schedule_the_next_night() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    let nightly = Schedule::Daily {
        at: TimeOfDay::new(2, 0).unwrap(),
    };
    store
        .add_job(&job("Nightly", &workdir.source(), "usb", nightly))
        .unwrap();
    let due_at = store.get_job("Nightly").unwrap().unwrap().next_run_at.unwrap();
    let daemon = workdir.daemon(store.clone());
    let scheduler = Scheduler::new(daemon.clone());

    assert!(scheduler
        .run_pass(due_at - Duration::from_secs(60))
        .unwrap()
        .started
        .is_empty());
    let report = scheduler.run_pass(due_at).unwrap();
    assert_eq!(report.started, ["Nightly"]);
    wait_until_idle(&daemon).await.unwrap();

    let after = store.get_job("Nightly").unwrap().unwrap();
    assert_eq!(after.status, Some(Status::Idle));
    assert_eq!(after.last_run_at, Some(due_at));
    assert_eq!(after.last_run_outcome, Some(Status::Completed));
    assert_eq!(after.next_run_at, Some(due_at + Duration::from_secs(24 * 60 * 60)));
    assert!(workdir.usb().join("documents.zip").is_file());

    assert!(scheduler.run_pass(due_at).unwrap().started.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_run_once_job_a_single_time() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    let once = Schedule::Once {
        date: date!(2099-06-01),
        at: TimeOfDay::new(9, 30).unwrap(),
    };
    store
        .add_job(&job("OnceJob", &workdir.source(), "usb", once))
        .unwrap();
    let due_at = store.get_job("OnceJob").unwrap().unwrap().next_run_at.unwrap();
    let daemon = workdir.daemon(store.clone());
    let scheduler = Scheduler::new(daemon.clone());

    assert_eq!(scheduler.run_pass(due_at).unwrap().started, ["OnceJob"]);
    wait_until_idle(&daemon).await.unwrap();

    let after = store.get_job("OnceJob").unwrap().unwrap();
    assert_eq!(after.status, Some(Status::Completed));
    assert_eq!(after.next_run_at, None);
    let later = due_at + Duration::from_secs(7 * 24 * 60 * 60);
    assert!(scheduler.run_pass(later).unwrap().started.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_record_failure_for_missing_source() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    let hourly = Schedule::Hourly {
        minute: Minute::new(0).unwrap(),
    };
    store
        .add_job(&job("Gone", &workdir.path().join("gone"), "usb", hourly))
        .unwrap();
    let due_at = store.get_job("Gone").unwrap().unwrap().next_run_at.unwrap();
    let daemon = workdir.daemon(store.clone());

    let report = Scheduler::new(daemon.clone()).run_pass(due_at).unwrap();

    assert!(report.started.is_empty());
    assert_eq!(report.preflight_failed, ["Gone"]);
    assert!(daemon.registry.is_empty());
    let after = store.get_job("Gone").unwrap().unwrap();
    assert_eq!(after.status, Some(Status::Idle));
    assert_eq!(after.last_run_outcome, Some(Status::Failed));
    assert_eq!(after.next_run_at, Some(due_at + Duration::from_secs(60 * 60)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_stop_scheduler_on_shutdown() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    let daemon = workdir.daemon(store);
    let shutdown = Shutdown::new();

    let handle = tokio::spawn(
        Scheduler::new(daemon.clone())
            .with_interval(Duration::from_millis(10))
            .run(shutdown.clone()),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request();

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(daemon.registry.is_empty());
}
