use clap::Parser;
use integration_tests::Workdir;
use packrat::{
    cli::{self, Cli, Cmd},
    commands,
};
use packrat_core::{
    conflict::Resolution,
    model::Status,
    schedule::{Schedule, TimeOfDay},
    store::JobStore,
};
use packrat_daemon::stations::{Health, Station};
use std::{
    ffi::OsStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

fn write_config(workdir: &Workdir) -> std::path::PathBuf {
    let path = workdir.path().join("packrat.toml");
    std::fs::write(&path, toml::to_string(&workdir.settings()).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn should_load_settings_from_config_file() {
    let workdir = Workdir::new().unwrap();
    let path = write_config(&workdir);

    let settings = commands::load_settings(&cli::ConfigFile::from(path.as_os_str()))
        .await
        .unwrap();

    assert_eq!(settings.source.as_deref(), Some(path.as_path()));
    assert_eq!(settings.staging_path, Some(workdir.staging()));
    assert_eq!(settings.providers, workdir.settings().providers);
}

#[tokio::test]
async fn should_use_defaults_without_config_file() {
    let workdir = Workdir::new().unwrap();
    let missing = workdir.path().join("missing.toml");

    let settings = commands::load_settings(&cli::ConfigFile::from(missing.as_os_str()))
        .await
        .unwrap();

    assert_eq!(settings, Default::default());
}

#[tokio::test]
async fn should_reject_invalid_config_file() {
    let workdir = Workdir::new().unwrap();
    let path = workdir.path().join("packrat.toml");
    std::fs::write(&path, "staging-path = 3").unwrap();

    let result = commands::load_settings(&cli::ConfigFile::from(OsStr::new(&path))).await;

    assert!(result.is_err());
}

#[test]
fn should_parse_config_file_argument() {
    let cli = Cli::try_parse_from(["packrat", "--config-file", "/etc/packrat.toml", "version"])
        .unwrap();

    assert_eq!(cli.config_file.to_string(), "/etc/packrat.toml");
    assert!(matches!(cli.subcommand, Cmd::Version));
}

#[test]
fn should_add_destination_and_job_from_arguments() {
    let workdir = Workdir::new().unwrap();
    let settings = workdir.settings();
    let usb = workdir.usb();
    let source = workdir.source();

    commands::destination::add("usb", &usb.to_string_lossy(), "local", &settings).unwrap();
    let cli = Cli::try_parse_from([
        OsStr::new("packrat"),
        OsStr::new("job"),
        OsStr::new("add"),
        OsStr::new("Nightly"),
        OsStr::new("--source"),
        source.as_os_str(),
        OsStr::new("--destination"),
        OsStr::new("usb"),
        OsStr::new("--schedule"),
        OsStr::new("daily"),
        OsStr::new("--at"),
        OsStr::new("02:00"),
    ])
    .unwrap();
    let Cmd::Job(cli::job::Cli {
        subcommand: cli::job::Cmd::Add(args),
    }) = cli.subcommand
    else {
        panic!("expected job add");
    };
    commands::job::add(args, &settings).unwrap();

    let store = workdir.database().unwrap();
    let job = store.get_job("Nightly").unwrap().unwrap();
    assert_eq!(
        job.schedule,
        Schedule::Daily {
            at: TimeOfDay::new(2, 0).unwrap()
        }
    );
    assert_eq!(job.destination.name, "usb");
    assert_eq!(job.source, source);
    assert_eq!(job.status, Some(Status::Idle));
    assert!(job.next_run_at.is_some());
}

#[test]
fn should_reject_relative_local_destination() {
    let workdir = Workdir::new().unwrap();

    let result = commands::destination::add("usb", "usb", "local", &workdir.settings());

    assert!(result.is_err());
    assert!(workdir.database().unwrap().destinations().unwrap().is_empty());
}

#[test]
fn should_not_remove_destination_in_use() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&integration_tests::job(
            "Docs",
            &workdir.source(),
            "usb",
            Schedule::Manual,
        ))
        .unwrap();
    drop(store);

    assert!(commands::destination::remove("usb", &workdir.settings()).is_err());
    commands::job::remove("Docs", &workdir.settings()).unwrap();
    commands::destination::remove("usb", &workdir.settings()).unwrap();
    assert!(commands::job::remove("Docs", &workdir.settings()).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_run_job_now() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&integration_tests::job(
            "Docs",
            &workdir.source(),
            "usb",
            Schedule::Manual,
        ))
        .unwrap();
    let daemon = workdir.daemon(store.clone());
    let job = store.get_job("Docs").unwrap().unwrap();

    let message = commands::job::run_job(&daemon, job, Resolution::Rename.into())
        .await
        .unwrap();

    assert_eq!(message, "Completed locally: documents.zip");
    assert!(daemon.registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_not_start_run_now_for_missing_source() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&integration_tests::job(
            "Gone",
            &workdir.path().join("gone"),
            "usb",
            Schedule::Manual,
        ))
        .unwrap();
    let daemon = workdir.daemon(store.clone());
    let changes = Arc::new(AtomicUsize::new(0));
    let seen = changes.clone();
    daemon.notifier.add_listener(Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    let job = store.get_job("Gone").unwrap().unwrap();

    let result = commands::job::run_job(&daemon, job, Resolution::Rename.into()).await;

    assert!(result.unwrap_err().to_string().contains("does not exist"));
    assert_eq!(changes.load(Ordering::SeqCst), 0);
    assert!(daemon.registry.is_empty());
    let after = store.get_job("Gone").unwrap().unwrap();
    assert_eq!(after.status, Some(Status::Idle));
    assert_eq!(after.last_run_outcome, Some(Status::Failed));
    assert_eq!(std::fs::read_dir(workdir.usb()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_check_every_station() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    let destinations = store.destinations().unwrap();
    let daemon = workdir.daemon(store);
    let cli = Cli::try_parse_from(["packrat", "check"]).unwrap();
    let Cmd::Check(args) = cli.subcommand else {
        panic!("expected check");
    };
    assert_eq!(args.email, None);

    let report = daemon.check_stations(&destinations, None).await.unwrap();

    assert!(report.passed());
    assert_eq!(report.health(Station::Packing), Some(Health::Ready));
    assert_eq!(report.health(Station::Shipping), Some(Health::Ready));
    assert_eq!(daemon.stations.get(Station::Shipping), Health::Ready);
    assert!(!workdir
        .drive()
        .join("Backups")
        .join("shipping_test_file.txt")
        .exists());
    assert_eq!(std::fs::read_dir(workdir.staging()).unwrap().count(), 0);
}
