use crate::{provider::ProviderKind, schedule::Schedule, Timestamp};
use std::path::PathBuf;

mod archive;
mod status;

pub use archive::{ArchiveLocation, ArchivedFile, RestoreRecord, RestoreRecordId};
pub use status::{Status, StatusParseError};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct DestinationId(pub i64);

/// A named target that archives are written to.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    /// Directory path for local destinations, remote folder identifier for cloud ones.
    pub location: String,
    pub provider: ProviderKind,
}

impl Destination {
    pub fn is_local(&self) -> bool {
        self.provider == ProviderKind::Local
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Recipient(pub String);

/// A persisted backup job as read from the job store.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct JobDescriptor {
    pub id: JobId,
    pub name: String,
    pub source: PathBuf,
    pub destination: Destination,
    pub move_files: bool,
    pub schedule: Schedule,
    /// Recipient of the completion email, if the job asked for one.
    pub notify: Option<Recipient>,
    /// `None` is treated as idle.
    pub status: Option<Status>,
    pub last_run_at: Option<Timestamp>,
    pub last_run_outcome: Option<Status>,
    pub next_run_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl JobDescriptor {
    pub fn is_idle(&self) -> bool {
        matches!(self.status, None | Some(Status::Idle))
    }

    /// Whether the scheduler should start this job at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.next_run_at {
            Some(next_run_at) => self.is_idle() && next_run_at <= now,
            None => false,
        }
    }

    /// The status the store should hold after a run of this job ends.
    pub fn status_after_run(&self, succeeded: bool) -> Status {
        if succeeded && self.schedule.is_once() {
            Status::Completed
        } else {
            Status::Idle
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use time::macros::datetime;

    pub(crate) fn job(schedule: Schedule) -> JobDescriptor {
        JobDescriptor {
            id: JobId(1),
            name: "Nightly".to_owned(),
            source: PathBuf::from("/home/user/documents"),
            destination: Destination {
                id: DestinationId(1),
                name: "usb".to_owned(),
                location: "/mnt/usb".to_owned(),
                provider: ProviderKind::Local,
            },
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
}
