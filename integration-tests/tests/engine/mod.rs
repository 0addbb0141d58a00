use integration_tests::{job, Workdir};
use maplit::btreemap;
use packrat_core::{
    conflict::Resolution,
    model::{ArchiveLocation, Status},
    provider::ProviderKind,
    schedule::Schedule,
    store::JobStore,
};
use packrat_daemon::job::{BackupRequest, RestoreEntry, RestoreRequest};

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_back_up_search_and_restore_locally() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&job("Docs", &workdir.source(), "usb", Schedule::Manual))
        .unwrap();
    let daemon = workdir.daemon(store.clone());

    let descriptor = store.get_job("Docs").unwrap().unwrap();
    let finished = daemon
        .start_backup(BackupRequest::new(descriptor))
        .wait()
        .await
        .unwrap();

    let report = finished.result.unwrap();
    let archive = ArchiveLocation::Local(workdir.usb().join("documents.zip"));
    assert_eq!(report.archive, archive);
    assert_eq!(report.file_count, 2);
    assert_eq!(finished.message, "Completed locally: documents.zip");
    assert!(workdir.usb().join("documents.zip").is_file());

    let found = store.search_files("2023", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].entry_name, "taxes/2023.csv");
    assert_eq!(found[0].archive, archive);

    let restored = daemon
        .start_restore(RestoreRequest::new(
            vec![RestoreEntry {
                archive: archive.clone(),
                entry_name: "taxes/2023.csv".to_owned(),
            }],
            workdir.restored(),
        ))
        .wait()
        .await
        .unwrap();

    assert_eq!(restored.message, "Restore complete.");
    assert_eq!(
        std::fs::read_to_string(workdir.restored().join("taxes").join("2023.csv")).unwrap(),
        "a,b,c"
    );
    let history = store.list_restore_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].final_status(), Some(Status::Completed));
    assert_eq!(history[0].entries, ["taxes/2023.csv"]);

    let after = store.get_job("Docs").unwrap().unwrap();
    assert_eq!(after.status, Some(Status::Idle));
    assert_eq!(after.last_run_outcome, Some(Status::Completed));
    assert!(daemon.registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_upload_to_sync_folder_and_restore_from_it() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&job("Cloud", &workdir.source(), "drive", Schedule::Manual))
        .unwrap();
    let daemon = workdir.daemon(store.clone());

    let descriptor = store.get_job("Cloud").unwrap().unwrap();
    let finished = daemon
        .start_backup(BackupRequest::new(descriptor))
        .wait()
        .await
        .unwrap();

    let remote = ArchiveLocation::remote(ProviderKind::GoogleDrive, "Backups/documents.zip");
    assert_eq!(finished.result.unwrap().archive, remote);
    assert_eq!(
        finished.message,
        "Upload complete: gdrive://Backups/documents.zip"
    );
    assert!(workdir.drive().join("Backups").join("documents.zip").is_file());
    assert!(!workdir.staging().join("documents.zip").exists());
    assert_eq!(store.files_in_archive(&remote).unwrap().len(), 2);

    let restored = daemon
        .start_restore(RestoreRequest::new(
            vec![RestoreEntry {
                archive: remote,
                entry_name: "notes.txt".to_owned(),
            }],
            workdir.restored(),
        ))
        .wait()
        .await
        .unwrap();

    assert_eq!(restored.result.unwrap().archives, 1);
    assert_eq!(
        std::fs::read_to_string(workdir.restored().join("notes.txt")).unwrap(),
        "remember the milk"
    );
    assert_eq!(std::fs::read_dir(workdir.staging()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_find_files_backed_up_twice() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&job("Docs", &workdir.source(), "usb", Schedule::Manual))
        .unwrap();
    let daemon = workdir.daemon(store.clone());

    for _ in 0..2 {
        let descriptor = store.get_job("Docs").unwrap().unwrap();
        let finished = daemon
            .start_backup(BackupRequest::new(descriptor).policy(Resolution::Rename))
            .wait()
            .await
            .unwrap();
        assert!(finished.result.is_ok());
    }

    let first = ArchiveLocation::Local(workdir.usb().join("documents.zip"));
    let second = ArchiveLocation::Local(workdir.usb().join("documents_1.zip"));
    assert_eq!(
        store.find_duplicates().unwrap(),
        btreemap! {
            "notes.txt".to_owned() => vec![first.clone(), second.clone()],
            "taxes/2023.csv".to_owned() => vec![first, second],
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn should_keep_existing_archive_when_conflict_cancels() {
    let workdir = Workdir::new().unwrap();
    let store = workdir.with_destinations().unwrap();
    store
        .add_job(&job("Docs", &workdir.source(), "usb", Schedule::Manual))
        .unwrap();
    std::fs::write(workdir.usb().join("documents.zip"), "not a zip").unwrap();
    let daemon = workdir.daemon(store.clone());

    let descriptor = store.get_job("Docs").unwrap().unwrap();
    let finished = daemon
        .start_backup(BackupRequest::new(descriptor).policy(Resolution::Cancel))
        .wait()
        .await
        .unwrap();

    assert!(finished.result.unwrap_err().is_cancelled());
    assert_eq!(
        std::fs::read_to_string(workdir.usb().join("documents.zip")).unwrap(),
        "not a zip"
    );
    assert!(store.search_files("", 10).unwrap().is_empty());
    let after = store.get_job("Docs").unwrap().unwrap();
    assert_eq!(after.last_run_outcome, Some(Status::Failed));
}
