use crate::{providers::SyncFolderProvider, registry::RunId, Daemon};
use packrat_core::{
    archive::{PackError, PackOutcome, Packager},
    cancellation::Token,
    config::Settings,
    conflict::ConflictPolicy,
    mail::{MailMessage, Mailer},
    model::{Destination, DestinationId, JobDescriptor, JobId, Recipient, Status},
    provider::{Provider, ProviderKind, RemoteId},
    schedule::Schedule,
    store::JobStore,
};
use parking_lot::{Condvar, Mutex};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use time::macros::datetime;

/// A temporary directory with a source tree, a local destination, a staging directory and
/// a mounted cloud drive.
pub struct Fixture(tempfile::TempDir);

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("documents");
        std::fs::create_dir_all(source.join("taxes")).unwrap();
        std::fs::write(source.join("notes.txt"), "remember the milk").unwrap();
        std::fs::write(source.join("taxes").join("2023.csv"), "a,b,c").unwrap();
        for dir in ["usb", "staging", "drive"] {
            std::fs::create_dir(tmp.path().join(dir)).unwrap();
        }
        Fixture(tmp)
    }

    pub fn root(&self) -> &Path {
        self.0.path()
    }

    pub fn source(&self) -> PathBuf {
        self.root().join("documents")
    }

    /// Another source directory, producing a differently named archive.
    pub fn second_source(&self) -> PathBuf {
        let source = self.root().join("pictures");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("cat.jpg"), "meow").unwrap();
        source
    }

    pub fn usb(&self) -> PathBuf {
        self.root().join("usb")
    }

    pub fn staging(&self) -> PathBuf {
        self.root().join("staging")
    }

    pub fn drive(&self) -> PathBuf {
        self.root().join("drive")
    }

    pub fn gdrive(&self) -> SyncFolderProvider {
        SyncFolderProvider::new(ProviderKind::GoogleDrive, self.drive())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            staging_path: Some(self.staging()),
            ..Default::default()
        }
    }

    pub fn daemon(&self, store: Arc<dyn JobStore>) -> Daemon {
        Daemon::new(
            self.settings(),
            store,
            Arc::new(packrat_archive::ZipPackager),
            Arc::new(packrat_archive::ZipExtractor),
        )
    }

    pub fn local_job(&self, name: &str, schedule: Schedule) -> JobDescriptor {
        job(
            name,
            self.source(),
            Destination {
                id: DestinationId(1),
                name: "usb".to_owned(),
                location: self.usb().display().to_string(),
                provider: ProviderKind::Local,
            },
            schedule,
        )
    }

    pub fn cloud_job(&self, name: &str, schedule: Schedule) -> JobDescriptor {
        job(
            name,
            self.source(),
            Destination {
                id: DestinationId(2),
                name: "drive".to_owned(),
                location: "Backups".to_owned(),
                provider: ProviderKind::GoogleDrive,
            },
            schedule,
        )
    }
}

pub fn job(
    name: &str,
    source: PathBuf,
    destination: Destination,
    schedule: Schedule,
) -> JobDescriptor {
    JobDescriptor {
        id: JobId(1),
        name: name.to_owned(),
        source,
        destination,
        move_files: false,
        schedule,
        notify: None,
        status: Some(Status::Idle),
        last_run_at: None,
        last_run_outcome: None,
        next_run_at: None,
        created_at: datetime!(2023-12-01 00:00:00 UTC),
    }
}

/// Records the status sequence of every run, collapsing repeats.
#[derive(Clone, Default)]
pub struct StatusRecorder(Arc<Mutex<HashMap<RunId, Vec<Status>>>>);

impl StatusRecorder {
    pub fn attach(daemon: &Daemon) -> Self {
        let recorder = StatusRecorder::default();
        let (registry, seen) = (daemon.registry.clone(), recorder.0.clone());
        daemon.notifier.add_listener(Arc::new(move || {
            let mut seen = seen.lock();
            for run in registry.list_running() {
                let statuses = seen.entry(run.id).or_default();
                if statuses.last() != Some(&run.status) {
                    statuses.push(run.status);
                }
            }
        }));
        recorder
    }

    pub fn statuses(&self, id: RunId) -> Vec<Status> {
        self.0.lock().get(&id).cloned().unwrap_or_default()
    }

    pub async fn wait_for(&self, id: RunId, status: Status) {
        for _ in 0..500 {
            if self.statuses(id).contains(&status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {id} never reached {status}");
    }
}

/// A latch that blocks packaging threads until it is opened.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (open, condvar) = &*self.0;
        *open.lock() = true;
        condvar.notify_all();
    }

    fn wait(&self) {
        let (open, condvar) = &*self.0;
        let mut open = open.lock();
        while !*open {
            condvar.wait(&mut open);
        }
    }
}

/// Zip packaging that first waits for its gate.
pub struct GatedPackager {
    gate: Gate,
}

impl GatedPackager {
    pub fn new(gate: Gate) -> Self {
        GatedPackager { gate }
    }
}

impl Packager for GatedPackager {
    fn pack(
        &self,
        source: &Path,
        output_root: &Path,
        policy: &ConflictPolicy,
        cancel: &Token,
    ) -> Result<PackOutcome, PackError> {
        self.gate.wait();
        packrat_archive::ZipPackager.pack(source, output_root, policy, cancel)
    }
}

pub struct PanickingPackager;

impl Packager for PanickingPackager {
    fn pack(
        &self,
        _source: &Path,
        _output_root: &Path,
        _policy: &ConflictPolicy,
        _cancel: &Token,
    ) -> Result<PackOutcome, PackError> {
        panic!("packager exploded")
    }
}

/// A Google Drive stand-in that accepts uploads without returning an id.
#[derive(Debug, Default)]
pub struct SilentProvider;

#[async_trait::async_trait]
impl Provider for SilentProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    fn display_name(&self) -> &str {
        "Silent Drive"
    }

    async fn authenticate(&self) -> eyre::Result<bool> {
        Ok(true)
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn free_space(&self) -> eyre::Result<Option<u64>> {
        Ok(None)
    }

    async fn upload(&self, _local_path: &Path, _remote_folder: &str) -> eyre::Result<Option<RemoteId>> {
        Ok(None)
    }

    async fn download(&self, _remote_id: &RemoteId, _local_path: &Path) -> eyre::Result<bool> {
        Ok(false)
    }

    async fn remote_hash(&self, _remote_id: &RemoteId) -> eyre::Result<Option<String>> {
        Ok(None)
    }

    async fn delete(&self, _remote_id: &RemoteId) -> eyre::Result<bool> {
        Ok(false)
    }
}

/// A Google Drive stand-in whose transfers panic.
#[derive(Debug, Default)]
pub struct PanickingProvider;

#[async_trait::async_trait]
impl Provider for PanickingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    fn display_name(&self) -> &str {
        "Broken Drive"
    }

    async fn authenticate(&self) -> eyre::Result<bool> {
        Ok(true)
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn free_space(&self) -> eyre::Result<Option<u64>> {
        Ok(None)
    }

    async fn upload(&self, _local_path: &Path, _remote_folder: &str) -> eyre::Result<Option<RemoteId>> {
        panic!("upload exploded")
    }

    async fn download(&self, _remote_id: &RemoteId, _local_path: &Path) -> eyre::Result<bool> {
        panic!("download exploded")
    }

    async fn remote_hash(&self, _remote_id: &RemoteId) -> eyre::Result<Option<String>> {
        Ok(None)
    }

    async fn delete(&self, _remote_id: &RemoteId) -> eyre::Result<bool> {
        Ok(false)
    }
}

pub struct PanickingMailer;

#[async_trait::async_trait]
impl Mailer for PanickingMailer {
    async fn send(&self, _message: &MailMessage, _recipient: &Recipient) -> eyre::Result<()> {
        panic!("mailer exploded")
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(MailMessage, Recipient)>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        RecordingMailer {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(MailMessage, Recipient)> {
        self.sent.lock().clone()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage, recipient: &Recipient) -> eyre::Result<()> {
        if self.fail {
            eyre::bail!("smtp server unreachable");
        }
        self.sent.lock().push((message.clone(), recipient.clone()));
        Ok(())
    }
}
