use super::{
    ensure_authenticated,
    summary::{ListedFile, RestoreSummary},
    CancelPoint, ExitCallback, Finished, JobError, Started,
};
use crate::{
    providers::staging_file_name,
    registry::{JobKind, Payload, RunId},
    Daemon,
};
use packrat_core::{
    cancellation::Token,
    model::{ArchiveLocation, Recipient, RestoreRecordId, Status},
    provider::RemoteId,
    timestamp,
};
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// One file to bring back, and the archive it was recorded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreEntry {
    pub archive: ArchiveLocation,
    pub entry_name: String,
}

pub struct RestoreRequest {
    pub entries: Vec<RestoreEntry>,
    pub destination: PathBuf,
    pub notify: Option<Recipient>,
    pub on_exit: Option<ExitCallback>,
}

impl RestoreRequest {
    pub fn new(entries: Vec<RestoreEntry>, destination: impl Into<PathBuf>) -> Self {
        RestoreRequest {
            entries,
            destination: destination.into(),
            notify: None,
            on_exit: None,
        }
    }

    pub fn notify(mut self, recipient: Recipient) -> Self {
        self.notify = Some(recipient);
        self
    }

    pub fn on_exit(mut self, on_exit: impl FnOnce() + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(on_exit));
        self
    }

    /// "Restore to <destination directory name>".
    pub fn label(&self) -> String {
        let name = self
            .destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.destination.display().to_string());
        format!("Restore to {name}")
    }
}

impl std::fmt::Debug for RestoreRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreRequest")
            .field("entries", &self.entries)
            .field("destination", &self.destination)
            .field("notify", &self.notify)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    pub archives: usize,
    pub entries: usize,
    pub bytes: u64,
}

impl Daemon {
    pub fn start_restore(&self, request: RestoreRequest) -> Started<RestoreReport> {
        let label = request.label();
        let RestoreRequest {
            entries,
            destination,
            notify,
            on_exit,
        } = request;
        let cancel = Token::new();
        let run_id = self.registry.register(
            Payload::Restore {
                label: label.clone(),
                destination: destination.clone(),
                entries: entries.len(),
            },
            JobKind::Restore,
            cancel.clone(),
            None,
        );
        tracing::info!(%label, %run_id, entries = entries.len(), "starting restore");

        let run = RestoreRun {
            daemon: self.clone(),
            run_id,
            label,
            entries,
            destination,
            notify,
            cancel: cancel.clone(),
            history: None,
        };
        let handle = tokio::spawn(run.run(on_exit));
        Started {
            run_id,
            cancel,
            handle,
        }
    }
}

#[derive(Clone)]
struct RestoreRun {
    daemon: Daemon,
    run_id: RunId,
    label: String,
    entries: Vec<RestoreEntry>,
    destination: PathBuf,
    notify: Option<Recipient>,
    cancel: Token,
    history: Option<RestoreRecordId>,
}

impl RestoreRun {
    #[tracing::instrument(name = "job", skip_all, fields(id = %self.run_id, name = %self.label))]
    async fn run(mut self, on_exit: Option<ExitCallback>) -> Finished<RestoreReport> {
        let result = match self.prepare() {
            Ok(()) => {
                // A panic while transferring or extracting still reaches the exit step.
                let steps = self.clone();
                tokio::spawn(async move { steps.execute().await }.in_current_span())
                    .await
                    .unwrap_or_else(|e| {
                        Err(JobError::Unhandled(eyre::eyre!("restore task failed: {e}")))
                    })
            }
            Err(e) => Err(e),
        };
        let status = if result.is_ok() {
            Status::Completed
        } else {
            Status::Failed
        };
        let message = match &result {
            Ok(_) => "Restore complete.".to_owned(),
            Err(e) if e.is_cancelled() => format!("Restore {e}."),
            Err(e) => format!("Restore failed: {e}"),
        };
        match &result {
            Ok(report) => tracing::info!(bytes = report.bytes, "finished"),
            Err(error) if error.is_cancelled() => tracing::warn!(%error, "cancelled"),
            Err(error) => tracing::error!(%error, "failed"),
        }

        if let Some(id) = self.history {
            if let Err(error) =
                self.daemon
                    .store
                    .finish_restore_history(id, status, timestamp::now())
            {
                tracing::warn!(%error, "failed to update restore history");
            }
        }
        self.daemon.registry.set_status(self.run_id, status);

        if let Some(recipient) = self.notify.clone() {
            self.daemon
                .registry
                .set_status(self.run_id, Status::NotifyingSender);
            let files = self
                .entries
                .iter()
                .map(|entry| ListedFile::from_entry(&entry.entry_name, None))
                .collect::<Vec<_>>();
            let mail = RestoreSummary {
                label: &self.label,
                status,
                message: &message,
                files: &files,
            }
            .to_message();
            if let Err(error) = super::send_mail(&self.daemon, mail, &recipient).await {
                tracing::error!(%error, recipient = %recipient.0, "failed to send completion email");
            }
            self.daemon.registry.set_status(self.run_id, status);
        }

        self.daemon.registry.unregister(self.run_id);
        if let Some(on_exit) = on_exit {
            self.daemon.notifier.run(on_exit);
        }
        Finished {
            run_id: self.run_id,
            message,
            result,
        }
    }

    /// Validates the request and opens its history record.
    fn prepare(&mut self) -> Result<(), JobError> {
        if self.entries.is_empty() || self.destination.as_os_str().is_empty() {
            return Err(JobError::Configuration(
                "missing files to restore or destination path".into(),
            ));
        }
        let names = self
            .entries
            .iter()
            .map(|entry| entry.entry_name.clone())
            .collect::<Vec<_>>();
        match self.daemon.store.add_restore_history(
            &self.label,
            &self.destination,
            &names,
            timestamp::now(),
        ) {
            Ok(id) => self.history = Some(id),
            Err(error) => tracing::warn!(%error, "failed to record restore history"),
        }
        Ok(())
    }

    async fn execute(&self) -> Result<RestoreReport, JobError> {
        self.cancel
            .check()
            .map_err(|_| JobError::Cancelled(CancelPoint::BeforeStart))?;
        let staging = self.daemon.settings.staging_path.clone().ok_or_else(|| {
            JobError::Configuration("no staging path configured for restores".into())
        })?;

        let mut report = RestoreReport {
            archives: 0,
            entries: 0,
            bytes: 0,
        };
        for (archive, entries) in group_by_archive(&self.entries) {
            self.cancel.check()?;
            let bytes = match &archive {
                ArchiveLocation::Local(path) => self.extract(path, &entries).await?,
                ArchiveLocation::Remote { id, .. } => {
                    let staged = staging.join(self.staged_name(id));
                    let result = self.download_and_extract(&archive, &staged, &entries).await;
                    if tokio::fs::metadata(&staged).await.is_ok() {
                        if let Err(error) = tokio::fs::remove_file(&staged).await {
                            tracing::warn!(%error, path = %staged.display(), "failed to remove downloaded archive");
                        }
                    }
                    result?
                }
            };
            report.archives += 1;
            report.entries += entries.len();
            report.bytes += bytes;
        }
        Ok(report)
    }

    async fn download_and_extract(
        &self,
        archive: &ArchiveLocation,
        staged: &Path,
        entries: &[String],
    ) -> Result<u64, JobError> {
        let ArchiveLocation::Remote { provider: kind, id } = archive else {
            return Err(JobError::Unhandled(eyre::eyre!("{archive} is not a remote archive")));
        };
        self.set_status(Status::Transferring);
        let provider = self
            .daemon
            .providers
            .get(*kind)
            .ok_or_else(|| JobError::Transfer(format!("no {kind} provider configured")))?;
        ensure_authenticated(&*provider).await?;
        tracing::info!(%archive, "downloading");
        let downloaded = provider
            .download(&RemoteId(id.clone()), staged)
            .await
            .map_err(|e| JobError::Transfer(format!("failed to download {archive}: {e:#}")))?;
        if !downloaded {
            return Err(JobError::Transfer(format!("failed to download {archive}")));
        }
        self.cancel.check()?;
        self.extract(staged, entries).await
    }

    async fn extract(&self, archive: &Path, entries: &[String]) -> Result<u64, JobError> {
        self.set_status(Status::Packaging);
        tracing::info!(archive = %archive.display(), entries = entries.len(), "extracting");
        let extractor = self.daemon.extractor.clone();
        let archive = archive.to_owned();
        let entries = entries.to_vec();
        let destination = self.destination.clone();
        let cancel = self.cancel.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            extractor.extract(&archive, &entries, &destination, &cancel)
        })
        .await
        .map_err(|e| JobError::Unhandled(eyre::eyre!("extraction worker failed: {e}")))??;
        Ok(bytes)
    }

    /// Download path for a remote archive, unique to this run.
    fn staged_name(&self, id: &str) -> String {
        format!("{}-{}", self.run_id, staging_file_name(id))
    }

    fn set_status(&self, status: Status) {
        tracing::debug!(%status, "status changed");
        self.daemon.registry.set_status(self.run_id, status);
    }
}

/// Groups entries by archive, keeping the order in which archives first appear.
fn group_by_archive(entries: &[RestoreEntry]) -> Vec<(ArchiveLocation, Vec<String>)> {
    let mut groups: Vec<(ArchiveLocation, Vec<String>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(archive, _)| *archive == entry.archive) {
            Some((_, names)) => names.push(entry.entry_name.clone()),
            None => groups.push((entry.archive.clone(), vec![entry.entry_name.clone()])),
        }
    }
    groups
}
