use humansize::{format_size, WINDOWS};
use packrat_core::{mail::MailMessage, model::Status};
use std::fmt::Write;

/// A file as listed in a completion email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub size: Option<u64>,
}

impl ListedFile {
    /// Lists an archive entry by its base name.
    pub fn from_entry(entry_name: &str, size: Option<u64>) -> Self {
        let name = entry_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(entry_name)
            .to_owned();
        ListedFile { name, size }
    }
}

#[derive(Debug)]
pub struct BackupSummary<'a> {
    pub job: &'a str,
    pub status: Status,
    pub message: &'a str,
    pub file_count: usize,
    pub total_bytes: u64,
    pub files: &'a [ListedFile],
}

impl BackupSummary<'_> {
    pub fn to_message(&self) -> MailMessage {
        let mut body = format!(
            "The job '{}' finished with status: {}.\n\nFinal message: {}\n\nFiles processed: {}\nTotal size: {}",
            self.job,
            self.status,
            self.message,
            self.file_count,
            format_size(self.total_bytes, WINDOWS),
        );
        if self.status == Status::Completed && !self.files.is_empty() {
            body.push_str("\n\nFiles in archive:\n");
            for file in self.files {
                let size = file
                    .size
                    .map(|size| format_size(size, WINDOWS))
                    .unwrap_or_else(|| "N/A".to_owned());
                let _ = writeln!(body, "- {} ({size})", file.name);
            }
        }
        MailMessage {
            subject: format!("Job '{}' Completion Status: {}", self.job, self.status),
            body,
        }
    }
}

#[derive(Debug)]
pub struct RestoreSummary<'a> {
    pub label: &'a str,
    pub status: Status,
    pub message: &'a str,
    pub files: &'a [ListedFile],
}

impl RestoreSummary<'_> {
    pub fn to_message(&self) -> MailMessage {
        let mut body = format!(
            "The restore job '{}' finished with status: {}.\n\nFinal message: {}",
            self.label, self.status, self.message
        );
        if self.status == Status::Completed && !self.files.is_empty() {
            body.push_str("\n\nFiles restored:\n");
            for file in self.files {
                let _ = writeln!(body, "- {}", file.name);
            }
        }
        MailMessage {
            subject: format!(
                "Restore Job '{}' Completion Status: {}",
                self.label, self.status
            ),
            body,
        }
    }
}
