use crate::{
    registry::RunId,
    stations::{Health, Station},
    Daemon,
};
use packrat_core::{
    cancellation::Token,
    mail::MailMessage,
    model::{JobDescriptor, Recipient, Status},
    provider::Provider,
    store::{JobStore, StatusUpdate},
};
use tokio::task::JoinHandle;
use tracing::Instrument;

mod backup;
mod error;
mod restore;
pub mod summary;

pub use backup::{BackupReport, BackupRequest};
pub use error::{CancelPoint, JobError};
pub use restore::{RestoreEntry, RestoreReport, RestoreRequest};

/// Called once a run has left the registry, through the notifier's dispatch context.
pub type ExitCallback = Box<dyn FnOnce() + Send>;

/// The end state of one run.
#[derive(Debug)]
pub struct Finished<T> {
    pub run_id: RunId,
    pub message: String,
    pub result: Result<T, JobError>,
}

impl<T> Finished<T> {
    pub fn status(&self) -> Status {
        if self.result.is_ok() {
            Status::Completed
        } else {
            Status::Failed
        }
    }
}

/// Handle to a run that has been registered and is executing on its own task.
#[derive(Debug)]
pub struct Started<T> {
    pub run_id: RunId,
    pub cancel: Token,
    handle: JoinHandle<Finished<T>>,
}

impl<T> Started<T> {
    pub async fn wait(self) -> eyre::Result<Finished<T>> {
        let Started { run_id, handle, .. } = self;
        handle
            .await
            .map_err(|e| eyre::eyre!("run {run_id} did not finish: {e}"))
    }
}

fn persist_status(store: &dyn JobStore, job: &JobDescriptor, update: StatusUpdate) {
    if let Err(error) = store.update_status(job.id, &update) {
        tracing::warn!(%error, status = %update.status, "failed to persist job status");
    }
}

pub(crate) async fn ensure_authenticated(provider: &dyn Provider) -> Result<(), JobError> {
    if provider.is_authenticated().await {
        return Ok(());
    }
    tracing::info!(provider = provider.display_name(), "authenticating");
    match provider.authenticate().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(JobError::Transfer(format!(
            "failed to authenticate with {}",
            provider.display_name()
        ))),
        Err(e) => Err(JobError::Transfer(format!(
            "failed to authenticate with {}: {e:#}",
            provider.display_name()
        ))),
    }
}

/// Sends on its own task, so a panicking mailer costs only the email.
pub(crate) async fn send_mail(
    daemon: &Daemon,
    mail: MailMessage,
    recipient: &Recipient,
) -> eyre::Result<()> {
    daemon.stations.set(Station::Notification, Health::Busy);
    let mailer = daemon.mailer.clone();
    let recipient = recipient.clone();
    let result = tokio::spawn(async move { mailer.send(&mail, &recipient).await }.in_current_span())
        .await
        .map_err(|e| eyre::eyre!("mailer task failed: {e}"))
        .and_then(|sent| sent);
    let health = if result.is_ok() { Health::Ready } else { Health::Failed };
    daemon.stations.set(Station::Notification, health);
    result
}
