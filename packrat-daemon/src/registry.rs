use events::Notifier;
use packrat_core::{
    cancellation::{Reason, Token},
    model::{Destination, Status},
    timestamp, Timestamp,
};
use parking_lot::Mutex;
use std::{path::PathBuf, sync::Arc};

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct RunId(uuid::Uuid);

impl Default for RunId {
    fn default() -> Self {
        RunId(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl RunId {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobKind {
    Backup,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Backup {
        job: String,
        source: PathBuf,
        destination: Destination,
    },
    Restore {
        label: String,
        destination: PathBuf,
        entries: usize,
    },
}

impl Payload {
    pub fn name(&self) -> &str {
        match self {
            Payload::Backup { job, .. } => job,
            Payload::Restore { label, .. } => label,
        }
    }
}

/// One in-flight run as seen from outside.
#[derive(Debug, Clone)]
pub struct RunningJob {
    pub id: RunId,
    pub kind: JobKind,
    pub payload: Payload,
    pub started_at: Timestamp,
    pub cancel: Token,
    pub status: Status,
}

/// Table of the runs that are executing right now.
///
/// Every mutation notifies the notifier's listeners once the table lock is released.
#[derive(Debug, Clone)]
pub struct Registry {
    runs: Arc<Mutex<Vec<RunningJob>>>,
    notifier: Notifier,
}

impl Registry {
    pub fn new(notifier: Notifier) -> Self {
        Registry {
            runs: Default::default(),
            notifier,
        }
    }

    /// Adds a run with status `Pending`. A record already using `id` is replaced.
    pub fn register(
        &self,
        payload: Payload,
        kind: JobKind,
        cancel: Token,
        id: Option<RunId>,
    ) -> RunId {
        let id = id.unwrap_or_default();
        {
            let mut runs = self.runs.lock();
            runs.retain(|run| run.id != id);
            runs.push(RunningJob {
                id,
                kind,
                payload,
                started_at: timestamp::now(),
                cancel,
                status: Status::Pending,
            });
        }
        self.notifier.notify();
        id
    }

    pub fn unregister(&self, id: RunId) {
        let removed = {
            let mut runs = self.runs.lock();
            let before = runs.len();
            runs.retain(|run| run.id != id);
            runs.len() != before
        };
        if removed {
            self.notifier.notify();
        }
    }

    pub fn set_status(&self, id: RunId, status: Status) {
        let changed = {
            let mut runs = self.runs.lock();
            match runs.iter_mut().find(|run| run.id == id) {
                Some(run) => {
                    run.status = status;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notifier.notify();
        }
    }

    /// Signals a run to stop. Returns whether the run was found.
    pub fn request_cancel(&self, id: RunId) -> bool {
        let token = self
            .runs
            .lock()
            .iter()
            .find(|run| run.id == id)
            .map(|run| run.cancel.clone());
        match token {
            Some(token) => {
                token.cancel(Reason::UserRequest);
                true
            }
            None => false,
        }
    }

    /// Signals every run to stop. Returns the number of runs signalled.
    pub fn request_cancel_all(&self, reason: Reason) -> usize {
        let tokens = self
            .runs
            .lock()
            .iter()
            .map(|run| run.cancel.clone())
            .collect::<Vec<_>>();
        for token in &tokens {
            token.cancel(reason);
        }
        tokens.len()
    }

    /// Snapshot of the running jobs, oldest first.
    pub fn list_running(&self) -> Vec<RunningJob> {
        self.runs.lock().clone()
    }

    pub fn get(&self, id: RunId) -> Option<RunningJob> {
        self.runs.lock().iter().find(|run| run.id == id).cloned()
    }

    /// Whether a backup of the job called `name` is in flight.
    pub fn is_job_running(&self, name: &str) -> bool {
        self.runs
            .lock()
            .iter()
            .any(|run| run.kind == JobKind::Backup && run.payload.name() == name)
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }
}
