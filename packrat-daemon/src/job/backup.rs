use super::{
    ensure_authenticated, persist_status,
    summary::{BackupSummary, ListedFile},
    CancelPoint, ExitCallback, Finished, JobError, Started,
};
use crate::{
    registry::{JobKind, Payload, RunId},
    stations::{Health, Station},
    Daemon,
};
use packrat_core::{
    archive::{PackAction, PackOutcome, Package},
    cancellation::Token,
    conflict::ConflictPolicy,
    model::{ArchiveLocation, ArchivedFile, JobDescriptor, Recipient, Status},
    store::StatusUpdate,
    timestamp, Timestamp,
};
use std::path::PathBuf;
use tracing::Instrument;

/// A request to run one backup job now.
pub struct BackupRequest {
    pub job: JobDescriptor,
    pub policy: ConflictPolicy,
    /// Start of the run; the next scheduled run is computed from it.
    pub started_at: Timestamp,
    pub on_exit: Option<ExitCallback>,
}

impl BackupRequest {
    pub fn new(job: JobDescriptor) -> Self {
        BackupRequest {
            job,
            policy: ConflictPolicy::default(),
            started_at: timestamp::now(),
            on_exit: None,
        }
    }

    pub fn policy(mut self, policy: impl Into<ConflictPolicy>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn started_at(mut self, started_at: Timestamp) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn on_exit(mut self, on_exit: impl FnOnce() + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(on_exit));
        self
    }
}

impl std::fmt::Debug for BackupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupRequest")
            .field("job", &self.job.name)
            .field("policy", &self.policy)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Where the archive ended up: the local file, or the remote object after an upload.
    pub archive: ArchiveLocation,
    pub action: PackAction,
    pub file_count: usize,
    pub total_bytes: u64,
}

impl Daemon {
    /// Marks a run of `job` at `now` as failed without registering it. Callers use this
    /// instead of `start_backup` when the job's source is missing.
    pub fn fail_missing_source(&self, job: &JobDescriptor, now: Timestamp) -> eyre::Result<()> {
        tracing::error!(
            job = %job.name,
            source = %job.source.display(),
            "source path does not exist, not starting job"
        );
        self.store.update_status(
            job.id,
            &StatusUpdate::new(Status::Idle)
                .next_run_at(job.schedule.next_run_after(now))
                .last_run(now, Status::Failed),
        )
    }

    /// Registers a backup run and starts it on its own task.
    ///
    /// The run is in the registry and persisted as `Pending`, with its next run already
    /// computed, by the time this returns.
    pub fn start_backup(&self, request: BackupRequest) -> Started<BackupReport> {
        let BackupRequest {
            job,
            policy,
            started_at,
            on_exit,
        } = request;
        let cancel = Token::new();
        let run_id = self.registry.register(
            Payload::Backup {
                job: job.name.clone(),
                source: job.source.clone(),
                destination: job.destination.clone(),
            },
            JobKind::Backup,
            cancel.clone(),
            None,
        );
        let next_run_at = job.schedule.next_run_after(started_at);
        persist_status(
            &*self.store,
            &job,
            StatusUpdate::new(Status::Pending).next_run_at(next_run_at),
        );
        tracing::info!(job = %job.name, %run_id, ?next_run_at, "starting backup");

        let run = BackupRun {
            daemon: self.clone(),
            run_id,
            job,
            policy,
            started_at,
            cancel: cancel.clone(),
            packed: None,
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
struct BackupRun {
    daemon: Daemon,
    run_id: RunId,
    job: JobDescriptor,
    policy: ConflictPolicy,
    started_at: Timestamp,
    cancel: Token,
    /// File count and byte total once packaging has succeeded.
    packed: Option<(usize, u64)>,
}

impl BackupRun {
    #[tracing::instrument(name = "job", skip_all, fields(id = %self.run_id, name = %self.job.name))]
    async fn run(mut self, on_exit: Option<ExitCallback>) -> Finished<BackupReport> {
        // The steps run on their own task so a panicking collaborator still reaches the exit step.
        let mut steps = self.clone();
        let result = match tokio::spawn(
            async move {
                let result = steps.execute().await;
                (result, steps.packed)
            }
            .in_current_span(),
        )
        .await
        {
            Ok((result, packed)) => {
                self.packed = packed;
                result
            }
            Err(e) => Err(JobError::Unhandled(eyre::eyre!("backup task failed: {e}"))),
        };
        let succeeded = result.is_ok();
        let status = if succeeded {
            Status::Completed
        } else {
            Status::Failed
        };
        let message = match &result {
            Ok(report) if report.archive.is_remote() => {
                format!("Upload complete: {}", report.archive)
            }
            Ok(report) => format!("Completed locally: {}", report.archive.file_name()),
            Err(e) if e.is_cancelled() => format!("Job {e}."),
            Err(e) => format!("Job failed: {e}"),
        };
        match &result {
            Ok(_) => tracing::info!(%message, "finished"),
            Err(error) if error.is_cancelled() => tracing::warn!(%error, "cancelled"),
            Err(error) => tracing::error!(%error, "failed"),
        }

        persist_status(
            &*self.daemon.store,
            &self.job,
            StatusUpdate::new(self.job.status_after_run(succeeded)).last_run(self.started_at, status),
        );
        self.daemon.registry.set_status(self.run_id, status);

        if let Some(recipient) = self.job.notify.clone() {
            self.daemon
                .registry
                .set_status(self.run_id, Status::NotifyingSender);
            self.send_summary(&recipient, status, &message, &result)
                .await;
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

    async fn execute(&mut self) -> Result<BackupReport, JobError> {
        self.cancel
            .check()
            .map_err(|_| JobError::Cancelled(CancelPoint::BeforeStart))?;

        let destination = self.job.destination.clone();
        let output_root = if destination.is_local() {
            if destination.location.is_empty() {
                return Err(JobError::Configuration(format!(
                    "destination '{}' has no location",
                    destination.name
                )));
            }
            PathBuf::from(&destination.location)
        } else {
            self.daemon.settings.staging_path.clone().ok_or_else(|| {
                JobError::Configuration("no staging path configured for cloud destinations".into())
            })?
        };

        self.set_status(Status::Packaging);
        let package = self.package(output_root).await?;
        self.packed = Some((package.file_count(), package.total_bytes()));
        let local = ArchiveLocation::Local(package.path.clone());
        self.record_files(&package, &local);
        let report = BackupReport {
            archive: local.clone(),
            action: package.action,
            file_count: package.file_count(),
            total_bytes: package.total_bytes(),
        };

        self.set_status(Status::AwaitingTransfer);
        if destination.is_local() {
            return Ok(report);
        }
        self.cancel.check()?;

        self.set_status(Status::Transferring);
        let provider = self.daemon.providers.get(destination.provider).ok_or_else(|| {
            JobError::Transfer(format!("no {} provider configured", destination.provider))
        })?;
        ensure_authenticated(&*provider).await?;
        self.daemon.stations.set(Station::Shipping, Health::Busy);
        let uploaded = provider.upload(&package.path, &destination.location).await;
        let health = match &uploaded {
            Ok(Some(_)) => Health::Ready,
            _ => Health::Failed,
        };
        self.daemon.stations.set(Station::Shipping, health);
        let remote_id = uploaded
            .map_err(|e| {
                JobError::Transfer(format!(
                    "upload to {} failed: {e:#}",
                    provider.display_name()
                ))
            })?
            .ok_or_else(|| {
                JobError::Transfer(format!(
                    "upload to {} returned no identifier",
                    provider.display_name()
                ))
            })?;

        self.set_status(Status::Verifying);
        let remote = ArchiveLocation::remote(destination.provider, remote_id.0);
        match self.daemon.store.update_archive_location(&local, &remote) {
            Ok(moved) => tracing::debug!(moved, archive = %remote, "recorded remote archive"),
            Err(error) => tracing::warn!(%error, archive = %remote, "failed to record remote archive"),
        }
        if let Err(error) = tokio::fs::remove_file(&package.path).await {
            tracing::warn!(%error, path = %package.path.display(), "failed to remove staged archive");
        }
        Ok(BackupReport {
            archive: remote,
            ..report
        })
    }

    async fn package(&self, output_root: PathBuf) -> Result<Package, JobError> {
        let packager = self.daemon.packager.clone();
        let source = self.job.source.clone();
        let policy = self.policy.clone();
        let cancel = self.cancel.clone();
        self.daemon.stations.set(Station::Packing, Health::Busy);
        let outcome = tokio::task::spawn_blocking(move || {
            packager.pack(&source, &output_root, &policy, &cancel)
        })
        .await;
        self.daemon.stations.set(Station::Packing, Health::Ready);
        let outcome =
            outcome.map_err(|e| JobError::Unhandled(eyre::eyre!("packaging worker failed: {e}")))??;
        match outcome {
            PackOutcome::Packed(package) => {
                tracing::info!(
                    archive = %package.path.display(),
                    action = ?package.action,
                    files = package.file_count(),
                    "package created"
                );
                Ok(package)
            }
            PackOutcome::Declined => Err(JobError::Cancelled(CancelPoint::ConflictDeclined)),
        }
    }

    fn record_files(&self, package: &Package, location: &ArchiveLocation) {
        let recorded_at = timestamp::now();
        let files = package
            .entries
            .iter()
            .map(|entry| ArchivedFile {
                original_path: entry.original_path.clone(),
                entry_name: entry.entry_name.clone(),
                archive: location.clone(),
                size: entry.size,
                compressed_size: entry.compressed_size,
                modified_at: entry.modified_at,
                recorded_at,
            })
            .collect::<Vec<_>>();
        if let Err(error) = self.daemon.store.record_archived_files(&files) {
            tracing::warn!(%error, "failed to record archived files");
        }
    }

    async fn send_summary(
        &self,
        recipient: &Recipient,
        status: Status,
        message: &str,
        result: &Result<BackupReport, JobError>,
    ) {
        let files = match result {
            Ok(report) => match self.daemon.store.files_in_archive(&report.archive) {
                Ok(files) => files
                    .iter()
                    .map(|file| ListedFile::from_entry(&file.entry_name, Some(file.size)))
                    .collect(),
                Err(error) => {
                    tracing::warn!(%error, "failed to list archived files");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        let (file_count, total_bytes) = self.packed.unwrap_or_default();
        let mail = BackupSummary {
            job: &self.job.name,
            status,
            message,
            file_count,
            total_bytes,
            files: &files,
        }
        .to_message();
        match super::send_mail(&self.daemon, mail, recipient).await {
            Ok(()) => tracing::info!(recipient = %recipient.0, "sent completion email"),
            Err(error) => tracing::error!(%error, recipient = %recipient.0, "failed to send completion email"),
        }
    }

    fn set_status(&self, status: Status) {
        tracing::debug!(%status, "status changed");
        self.daemon.registry.set_status(self.run_id, status);
    }
}
