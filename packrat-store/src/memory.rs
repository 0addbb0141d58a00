use packrat_core::{
    model::{
        ArchiveLocation, ArchivedFile, JobDescriptor, JobId, RestoreRecord, RestoreRecordId,
        Status,
    },
    store::{JobStore, StatusUpdate},
    Timestamp,
};
use parking_lot::Mutex;
use std::path::Path;

#[derive(Debug, Default)]
struct State {
    jobs: Vec<JobDescriptor>,
    updates: Vec<(JobId, StatusUpdate)>,
    files: Vec<ArchivedFile>,
    history: Vec<RestoreRecord>,
    fail_writes: bool,
}

/// Job store that keeps everything in memory and remembers every status update it was
/// given, in order.
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<State>);

impl MemoryStore {
    pub fn new(jobs: impl IntoIterator<Item = JobDescriptor>) -> Self {
        MemoryStore(Mutex::new(State {
            jobs: jobs.into_iter().collect(),
            ..Default::default()
        }))
    }

    pub fn insert_job(&self, job: JobDescriptor) {
        let mut state = self.0.lock();
        state.jobs.retain(|j| j.id != job.id);
        state.jobs.push(job);
    }

    /// Status updates received so far for `id`.
    pub fn updates(&self, id: JobId) -> Vec<StatusUpdate> {
        self.0
            .lock()
            .updates
            .iter()
            .filter(|(job, _)| *job == id)
            .map(|(_, update)| update.clone())
            .collect()
    }

    pub fn files(&self) -> Vec<ArchivedFile> {
        self.0.lock().files.clone()
    }

    pub fn history(&self) -> Vec<RestoreRecord> {
        self.0.lock().history.clone()
    }

    /// Makes every following write fail, for exercising store outages.
    pub fn fail_writes(&self, fail: bool) {
        self.0.lock().fail_writes = fail;
    }

    fn check_writable(state: &State) -> eyre::Result<()> {
        if state.fail_writes {
            eyre::bail!("store is read-only");
        }
        Ok(())
    }
}

impl JobStore for MemoryStore {
    fn list_jobs(&self) -> eyre::Result<Vec<JobDescriptor>> {
        Ok(self.0.lock().jobs.clone())
    }

    fn get_job(&self, name: &str) -> eyre::Result<Option<JobDescriptor>> {
        Ok(self.0.lock().jobs.iter().find(|j| j.name == name).cloned())
    }

    fn update_status(&self, id: JobId, update: &StatusUpdate) -> eyre::Result<()> {
        let mut state = self.0.lock();
        Self::check_writable(&state)?;
        state.updates.push((id, update.clone()));
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = Some(update.status);
            if let Some(next_run_at) = update.next_run_at {
                job.next_run_at = next_run_at;
            }
            if let Some(last_run) = update.last_run {
                job.last_run_at = Some(last_run.at);
                job.last_run_outcome = Some(last_run.outcome);
            }
        }
        Ok(())
    }

    fn record_archived_files(&self, files: &[ArchivedFile]) -> eyre::Result<()> {
        let mut state = self.0.lock();
        Self::check_writable(&state)?;
        state.files.extend_from_slice(files);
        Ok(())
    }

    fn update_archive_location(
        &self,
        old: &ArchiveLocation,
        new: &ArchiveLocation,
    ) -> eyre::Result<usize> {
        let mut state = self.0.lock();
        Self::check_writable(&state)?;
        let mut moved = 0;
        for file in state.files.iter_mut().filter(|f| &f.archive == old) {
            file.archive = new.clone();
            moved += 1;
        }
        Ok(moved)
    }

    fn files_in_archive(&self, location: &ArchiveLocation) -> eyre::Result<Vec<ArchivedFile>> {
        let mut files = self
            .0
            .lock()
            .files
            .iter()
            .filter(|f| &f.archive == location)
            .cloned()
            .collect::<Vec<_>>();
        files.sort_by(|a, b| a.entry_name.cmp(&b.entry_name));
        Ok(files)
    }

    fn add_restore_history(
        &self,
        label: &str,
        destination: &Path,
        entries: &[String],
        started_at: Timestamp,
    ) -> eyre::Result<RestoreRecordId> {
        let mut state = self.0.lock();
        Self::check_writable(&state)?;
        let id = RestoreRecordId(state.history.len() as i64 + 1);
        state.history.push(RestoreRecord {
            id,
            label: label.to_owned(),
            destination: destination.to_owned(),
            status: RestoreRecord::INITIALIZING.to_owned(),
            started_at,
            finished_at: None,
            entries: entries.to_vec(),
        });
        Ok(id)
    }

    fn finish_restore_history(
        &self,
        id: RestoreRecordId,
        status: Status,
        finished_at: Timestamp,
    ) -> eyre::Result<()> {
        let mut state = self.0.lock();
        Self::check_writable(&state)?;
        if let Some(record) = state.history.iter_mut().find(|r| r.id == id) {
            record.status = status.label().to_owned();
            record.finished_at = Some(finished_at);
        }
        Ok(())
    }
}
