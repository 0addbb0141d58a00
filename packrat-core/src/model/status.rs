use std::{fmt, str::FromStr};

/// Lifecycle state of a job, shared between the in-memory registry and the job store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// Rest state of a persisted job that is not running.
    Idle,
    Pending,
    Packaging,
    AwaitingTransfer,
    Transferring,
    Verifying,
    NotifyingSender,
    Completed,
    Failed,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Idle,
        Status::Pending,
        Status::Packaging,
        Status::AwaitingTransfer,
        Status::Transferring,
        Status::Verifying,
        Status::NotifyingSender,
        Status::Completed,
        Status::Failed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::Pending => "Pending",
            Status::Packaging => "Packaging",
            Status::AwaitingTransfer => "Awaiting Transfer",
            Status::Transferring => "Transferring",
            Status::Verifying => "Verifying",
            Status::NotifyingSender => "Notifying Sender",
            Status::Completed => "Completed",
            Status::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct StatusParseError(pub String);

impl FromStr for Status {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Status::ALL
            .iter()
            .copied()
            .find(|status| {
                let label: String = status.label().chars().filter(|c| *c != ' ').collect();
                label.eq_ignore_ascii_case(&wanted)
            })
            .ok_or_else(|| StatusParseError(s.to_owned()))
    }
}
