use crate::{format_ts, parse_opt_ts, parse_ts, Database};
use eyre::{eyre, WrapErr};
use packrat_core::{
    model::{Destination, DestinationId, JobDescriptor, JobId, Recipient, Status},
    provider::ProviderKind,
    schedule::{Schedule, ScheduleColumns},
    store::StatusUpdate,
    timestamp,
};
use rusqlite::{named_params, OptionalExtension};
use std::path::PathBuf;

/// The user-editable part of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub name: String,
    pub source: PathBuf,
    /// Name of an existing destination.
    pub destination: String,
    pub move_files: bool,
    pub schedule: Schedule,
    pub notify: Option<Recipient>,
}

#[derive(serde::Deserialize)]
struct DestinationRow {
    id: i64,
    name: String,
    location: String,
    provider: String,
}

impl TryFrom<DestinationRow> for Destination {
    type Error = eyre::Report;

    fn try_from(row: DestinationRow) -> eyre::Result<Self> {
        Ok(Destination {
            id: DestinationId(row.id),
            provider: row
                .provider
                .parse::<ProviderKind>()
                .wrap_err_with(|| format!("destination '{}'", row.name))?,
            name: row.name,
            location: row.location,
        })
    }
}

#[derive(serde::Deserialize)]
struct JobRow {
    id: i64,
    name: String,
    source_path: String,
    move_files: i64,
    schedule: Option<String>,
    schedule_hour: Option<i64>,
    schedule_minute: Option<i64>,
    schedule_date: Option<String>,
    schedule_day_of_week: Option<String>,
    send_email_on_completion: i64,
    recipient_email: Option<String>,
    status: Option<String>,
    last_run_at: Option<String>,
    last_run_status: Option<String>,
    next_run_at: Option<String>,
    created_at: String,
    destination_id: i64,
    destination_name: String,
    destination_location: String,
    destination_provider: String,
}

fn parse_status(s: Option<&str>) -> eyre::Result<Option<Status>> {
    Ok(s.filter(|s| !s.trim().is_empty())
        .map(str::parse::<Status>)
        .transpose()?)
}

impl TryFrom<JobRow> for JobDescriptor {
    type Error = eyre::Report;

    fn try_from(row: JobRow) -> eyre::Result<Self> {
        let schedule = Schedule::from_columns(&ScheduleColumns {
            kind: row.schedule.unwrap_or_default(),
            hour: row.schedule_hour,
            minute: row.schedule_minute,
            date: row.schedule_date,
            day_of_week: row.schedule_day_of_week,
        })?;
        let notify = match (row.send_email_on_completion != 0, row.recipient_email) {
            (true, Some(recipient)) if !recipient.trim().is_empty() => {
                Some(Recipient(recipient))
            }
            _ => None,
        };
        let destination = Destination::try_from(DestinationRow {
            id: row.destination_id,
            name: row.destination_name,
            location: row.destination_location,
            provider: row.destination_provider,
        })?;
        Ok(JobDescriptor {
            id: JobId(row.id),
            name: row.name,
            source: PathBuf::from(row.source_path),
            destination,
            move_files: row.move_files != 0,
            schedule,
            notify,
            status: parse_status(row.status.as_deref())?,
            last_run_at: parse_opt_ts(row.last_run_at.as_deref())?,
            last_run_outcome: parse_status(row.last_run_status.as_deref())?,
            next_run_at: parse_opt_ts(row.next_run_at.as_deref())?,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

//language=SQLite
const SELECT_JOBS: &str = "--
SELECT jobs.id,
       jobs.name,
       jobs.source_path,
       jobs.move_files,
       jobs.schedule,
       jobs.schedule_hour,
       jobs.schedule_minute,
       jobs.schedule_date,
       jobs.schedule_day_of_week,
       jobs.send_email_on_completion,
       jobs.recipient_email,
       jobs.status,
       jobs.last_run_at,
       jobs.last_run_status,
       jobs.next_run_at,
       jobs.created_at,
       destinations.id       AS destination_id,
       destinations.name     AS destination_name,
       destinations.location AS destination_location,
       destinations.provider AS destination_provider
FROM jobs
         JOIN destinations ON destinations.id = jobs.destination_id";

impl Database {
    pub fn add_destination(
        &self,
        name: &str,
        location: &str,
        provider: ProviderKind,
    ) -> eyre::Result<DestinationId> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "INSERT INTO destinations (name, location, provider) VALUES (?, ?, ?) RETURNING id",
        )?;
        let id = stmt
            .query_row((name, location, provider.tag()), |r| r.get(0))
            .wrap_err_with(|| format!("failed to add destination '{name}'"))?;
        Ok(DestinationId(id))
    }

    pub fn update_destination(
        &self,
        name: &str,
        location: &str,
        provider: ProviderKind,
    ) -> eyre::Result<bool> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn
            .prepare_cached("UPDATE destinations SET location = ?, provider = ? WHERE name = ?")?;
        Ok(stmt.execute((location, provider.tag(), name))? > 0)
    }

    /// Removes a destination. Fails while jobs still use it.
    pub fn remove_destination(&self, name: &str) -> eyre::Result<bool> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached("DELETE FROM destinations WHERE name = ?")?;
        let removed = stmt
            .execute([name])
            .wrap_err_with(|| format!("destination '{name}' is still in use"))?;
        Ok(removed > 0)
    }

    pub fn destinations(&self) -> eyre::Result<Vec<Destination>> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt =
            conn.prepare_cached("SELECT id, name, location, provider FROM destinations ORDER BY name")?;
        let rows = stmt.query(())?;
        let destinations = serde_rusqlite::from_rows::<DestinationRow>(rows)
            .map(|row| Destination::try_from(row?))
            .collect::<eyre::Result<_>>()?;
        Ok(destinations)
    }

    pub fn destination(&self, name: &str) -> eyre::Result<Option<Destination>> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, location, provider FROM destinations WHERE name = ?",
        )?;
        let row = stmt
            .query_row([name], |row| Ok(serde_rusqlite::from_row::<DestinationRow>(row)))
            .optional()?;
        let destination = row.map(|row| Destination::try_from(row?)).transpose()?;
        Ok(destination)
    }

    /// Adds a job. Its first run is scheduled from now.
    pub fn add_job(&self, job: &JobDefinition) -> eyre::Result<JobId> {
        let destination = self
            .destination(&job.destination)?
            .ok_or_else(|| eyre!("unknown destination '{}'", job.destination))?;
        let now = timestamp::now();
        let next_run_at = job.schedule.next_run_after(now);
        let columns = job.schedule.to_columns();
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "--
INSERT INTO jobs (name, source_path, destination_id, move_files, schedule, schedule_hour,
                  schedule_minute, schedule_date, schedule_day_of_week, send_email_on_completion,
                  recipient_email, status, next_run_at, created_at)
VALUES (:name, :source_path, :destination_id, :move_files, :schedule, :schedule_hour,
        :schedule_minute, :schedule_date, :schedule_day_of_week, :send_email,
        :recipient_email, :status, :next_run_at, :created_at)
RETURNING id",
        )?;
        let id = stmt
            .query_row(
                named_params! {
                    ":name": job.name,
                    ":source_path": job.source.to_string_lossy().into_owned(),
                    ":destination_id": destination.id.0,
                    ":move_files": job.move_files,
                    ":schedule": columns.kind,
                    ":schedule_hour": columns.hour,
                    ":schedule_minute": columns.minute,
                    ":schedule_date": columns.date,
                    ":schedule_day_of_week": columns.day_of_week,
                    ":send_email": job.notify.is_some(),
                    ":recipient_email": job.notify.as_ref().map(|r| &r.0),
                    ":status": Status::Idle.label(),
                    ":next_run_at": next_run_at.as_ref().map(format_ts).transpose()?,
                    ":created_at": format_ts(&now)?,
                },
                |r| r.get(0),
            )
            .wrap_err_with(|| format!("failed to add job '{}'", job.name))?;
        tracing::info!(name = %job.name, ?next_run_at, "added job");
        Ok(JobId(id))
    }

    /// Replaces the definition of the job called `name`, rescheduling it from now.
    pub fn update_job(&self, name: &str, job: &JobDefinition) -> eyre::Result<bool> {
        let destination = self
            .destination(&job.destination)?
            .ok_or_else(|| eyre!("unknown destination '{}'", job.destination))?;
        let next_run_at = job.schedule.next_run_after(timestamp::now());
        let columns = job.schedule.to_columns();
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "--
UPDATE jobs
SET name                     = :new_name,
    source_path              = :source_path,
    destination_id           = :destination_id,
    move_files               = :move_files,
    schedule                 = :schedule,
    schedule_hour            = :schedule_hour,
    schedule_minute          = :schedule_minute,
    schedule_date            = :schedule_date,
    schedule_day_of_week     = :schedule_day_of_week,
    send_email_on_completion = :send_email,
    recipient_email          = :recipient_email,
    next_run_at              = :next_run_at
WHERE name = :name",
        )?;
        let updated = stmt.execute(named_params! {
            ":name": name,
            ":new_name": job.name,
            ":source_path": job.source.to_string_lossy().into_owned(),
            ":destination_id": destination.id.0,
            ":move_files": job.move_files,
            ":schedule": columns.kind,
            ":schedule_hour": columns.hour,
            ":schedule_minute": columns.minute,
            ":schedule_date": columns.date,
            ":schedule_day_of_week": columns.day_of_week,
            ":send_email": job.notify.is_some(),
            ":recipient_email": job.notify.as_ref().map(|r| &r.0),
            ":next_run_at": next_run_at.as_ref().map(format_ts).transpose()?,
        })?;
        Ok(updated > 0)
    }

    pub fn remove_job(&self, name: &str) -> eyre::Result<bool> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached("DELETE FROM jobs WHERE name = ?")?;
        Ok(stmt.execute([name])? > 0)
    }

    /// All jobs, by name. Rows that can't be loaded are logged and skipped so one broken
    /// job doesn't stop the others from being scheduled.
    pub(crate) fn jobs(&self) -> eyre::Result<Vec<JobDescriptor>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{SELECT_JOBS} ORDER BY jobs.name"))?;
        let rows = stmt.query(())?;
        let mut jobs = Vec::new();
        for row in serde_rusqlite::from_rows::<JobRow>(rows) {
            let row = row?;
            let name = row.name.clone();
            match JobDescriptor::try_from(row) {
                Ok(job) => jobs.push(job),
                Err(error) => tracing::warn!(%name, %error, "skipping invalid job"),
            }
        }
        Ok(jobs)
    }

    pub(crate) fn job(&self, name: &str) -> eyre::Result<Option<JobDescriptor>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{SELECT_JOBS} WHERE jobs.name = ?"))?;
        let row = stmt
            .query_row([name], |row| Ok(serde_rusqlite::from_row::<JobRow>(row)))
            .optional()?;
        let job = row
            .map(|row| {
                JobDescriptor::try_from(row?).wrap_err_with(|| format!("invalid job '{name}'"))
            })
            .transpose()?;
        Ok(job)
    }

    pub(crate) fn update_job_status(&self, id: JobId, update: &StatusUpdate) -> eyre::Result<()> {
        let set_next_run = update.next_run_at.is_some();
        let next_run_at = update
            .next_run_at
            .flatten()
            .as_ref()
            .map(format_ts)
            .transpose()?;
        let last_run_at = update
            .last_run
            .map(|last| format_ts(&last.at))
            .transpose()?;
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "--
UPDATE jobs
SET status          = :status,
    next_run_at     = CASE WHEN :set_next_run THEN :next_run_at ELSE next_run_at END,
    last_run_at     = COALESCE(:last_run_at, last_run_at),
    last_run_status = COALESCE(:last_run_status, last_run_status)
WHERE id = :id",
        )?;
        stmt.execute(named_params! {
            ":id": id.0,
            ":status": update.status.label(),
            ":set_next_run": set_next_run,
            ":next_run_at": next_run_at,
            ":last_run_at": last_run_at,
            ":last_run_status": update.last_run.map(|last| last.outcome.label()),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::database_with_destination;
    use packrat_core::{schedule::TimeOfDay, store::JobStore};
    use time::macros::datetime;

    fn nightly() -> JobDefinition {
        JobDefinition {
            name: "Nightly".to_owned(),
            source: PathBuf::from("/home/me/documents"),
            destination: "usb".to_owned(),
            move_files: false,
            schedule: Schedule::Daily {
                at: TimeOfDay::new(2, 0).unwrap(),
            },
            notify: Some(Recipient("me@example.com".to_owned())),
        }
    }

    mod destinations {
        use super::*;

        #[test]
        fn should_list_destinations_by_name() {
            let db = database_with_destination();
            db.add_destination("cloud", "Backups", ProviderKind::GoogleDrive)
                .unwrap();

            let names = db
                .destinations()
                .unwrap()
                .into_iter()
                .map(|d| (d.name, d.provider))
                .collect::<Vec<_>>();

            assert_eq!(
                names,
                vec![
                    ("cloud".to_owned(), ProviderKind::GoogleDrive),
                    ("usb".to_owned(), ProviderKind::Local)
                ]
            );
        }

        #[test]
        fn should_reject_duplicate_destination_names() {
            let db = database_with_destination();

            let result = db.add_destination("usb", "/mnt/other", ProviderKind::Local);

            assert!(result.is_err());
        }

        #[test]
        fn should_update_destination() {
            let db = database_with_destination();

            let updated = db
                .update_destination("usb", "/mnt/usb2", ProviderKind::Local)
                .unwrap();

            assert!(updated);
            assert_eq!(db.destination("usb").unwrap().unwrap().location, "/mnt/usb2");
        }

        #[test]
        fn should_not_remove_destination_in_use() {
            let db = database_with_destination();
            db.add_job(&nightly()).unwrap();

            assert!(db.remove_destination("usb").is_err());
        }

        #[test]
        fn should_remove_unused_destination() {
            let db = database_with_destination();

            assert!(db.remove_destination("usb").unwrap());
            assert!(!db.remove_destination("usb").unwrap());
            assert_eq!(db.destination("usb").unwrap(), None);
        }
    }

    mod jobs {
        use super::*;

        #[test]
        fn should_add_and_load_job() {
            let db = database_with_destination();

            let id = db.add_job(&nightly()).unwrap();
            let job = db.get_job("Nightly").unwrap().unwrap();

            assert_eq!(job.id, id);
            assert_eq!(job.source, PathBuf::from("/home/me/documents"));
            assert_eq!(job.destination.name, "usb");
            assert_eq!(job.destination.provider, ProviderKind::Local);
            assert_eq!(
                job.schedule,
                Schedule::Daily {
                    at: TimeOfDay::new(2, 0).unwrap()
                }
            );
            assert_eq!(job.notify, Some(Recipient("me@example.com".to_owned())));
            assert_eq!(job.status, Some(Status::Idle));
            assert!(job.next_run_at.is_some());
            assert_eq!(job.last_run_at, None);
        }

        #[test]
        fn should_not_schedule_manual_jobs() {
            let db = database_with_destination();

            db.add_job(&JobDefinition {
                schedule: Schedule::Manual,
                ..nightly()
            })
            .unwrap();

            assert_eq!(db.get_job("Nightly").unwrap().unwrap().next_run_at, None);
        }

        #[test]
        fn should_reject_unknown_destination() {
            let db = database_with_destination();

            let result = db.add_job(&JobDefinition {
                destination: "nope".to_owned(),
                ..nightly()
            });

            assert!(result.is_err());
        }

        #[test]
        fn should_reject_duplicate_job_names() {
            let db = database_with_destination();
            db.add_job(&nightly()).unwrap();

            assert!(db.add_job(&nightly()).is_err());
        }

        #[test]
        fn should_update_job_definition() {
            let db = database_with_destination();
            db.add_job(&nightly()).unwrap();

            db.update_job(
                "Nightly",
                &JobDefinition {
                    name: "Weekly".to_owned(),
                    schedule: Schedule::Weekly {
                        day: time::Weekday::Sunday,
                        at: TimeOfDay::new(3, 30).unwrap(),
                    },
                    notify: None,
                    ..nightly()
                },
            )
            .unwrap();

            assert_eq!(db.get_job("Nightly").unwrap(), None);
            let job = db.get_job("Weekly").unwrap().unwrap();
            assert_eq!(job.notify, None);
            assert_eq!(job.schedule.kind(), "Weekly");
        }

        #[test]
        fn should_remove_job() {
            let db = database_with_destination();
            db.add_job(&nightly()).unwrap();

            assert!(db.remove_job("Nightly").unwrap());
            assert!(db.list_jobs().unwrap().is_empty());
        }

        #[test]
        fn should_skip_jobs_with_invalid_schedule() {
            let db = database_with_destination();
            db.add_job(&nightly()).unwrap();
            db.add_job(&JobDefinition {
                name: "Broken".to_owned(),
                ..nightly()
            })
            .unwrap();
            db.conn
                .lock()
                .execute(
                    "UPDATE jobs SET schedule = 'Weekly', schedule_day_of_week = NULL WHERE name = 'Broken'",
                    (),
                )
                .unwrap();

            let names = db
                .list_jobs()
                .unwrap()
                .into_iter()
                .map(|job| job.name)
                .collect::<Vec<_>>();

            assert_eq!(names, vec!["Nightly".to_owned()]);
            assert!(db.get_job("Broken").is_err());
        }
    }

    mod status {
        use super::*;

        #[test]
        fn should_persist_pending_with_next_run() {
            let db = database_with_destination();
            let id = db.add_job(&nightly()).unwrap();

            db.update_status(
                id,
                &StatusUpdate::new(Status::Pending)
                    .next_run_at(Some(datetime!(2024-01-02 02:00:00 UTC))),
            )
            .unwrap();

            let job = db.get_job("Nightly").unwrap().unwrap();
            assert_eq!(job.status, Some(Status::Pending));
            assert_eq!(job.next_run_at, Some(datetime!(2024-01-02 02:00:00 UTC)));
            assert_eq!(job.last_run_at, None);
        }

        #[test]
        fn should_persist_final_status_and_keep_next_run() {
            let db = database_with_destination();
            let id = db.add_job(&nightly()).unwrap();
            db.update_status(
                id,
                &StatusUpdate::new(Status::Pending)
                    .next_run_at(Some(datetime!(2024-01-02 02:00:00 UTC))),
            )
            .unwrap();

            db.update_status(
                id,
                &StatusUpdate::new(Status::Idle)
                    .last_run(datetime!(2024-01-01 02:05:00 UTC), Status::Completed),
            )
            .unwrap();

            let job = db.get_job("Nightly").unwrap().unwrap();
            assert_eq!(job.status, Some(Status::Idle));
            assert_eq!(job.next_run_at, Some(datetime!(2024-01-02 02:00:00 UTC)));
            assert_eq!(job.last_run_at, Some(datetime!(2024-01-01 02:05:00 UTC)));
            assert_eq!(job.last_run_outcome, Some(Status::Completed));
        }

        #[test]
        fn should_clear_next_run() {
            let db = database_with_destination();
            let id = db.add_job(&nightly()).unwrap();

            db.update_status(id, &StatusUpdate::new(Status::Completed).next_run_at(None))
                .unwrap();

            let job = db.get_job("Nightly").unwrap().unwrap();
            assert_eq!(job.status, Some(Status::Completed));
            assert_eq!(job.next_run_at, None);
        }
    }
}
