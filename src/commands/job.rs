use super::{daemon::setup_logger, prompt::TerminalPrompt};
use crate::{cli, commands};
use eyre::eyre;
use packrat_core::{
    cancellation::Reason,
    config::Settings,
    conflict::{ConflictPolicy, Resolution},
    model::{JobDescriptor, Recipient},
    schedule::{Schedule, ScheduleColumns},
    store::JobStore,
    timestamp, Timestamp,
};
use packrat_daemon::{
    job::{BackupRequest, JobError},
    Daemon,
};
use packrat_store::JobDefinition;
use std::sync::Arc;

fn conflict_policy(on_conflict: cli::run::OnConflict) -> ConflictPolicy {
    use cli::run::OnConflict;
    match on_conflict {
        OnConflict::Overwrite => Resolution::Overwrite.into(),
        OnConflict::Rename => Resolution::Rename.into(),
        OnConflict::Cancel => Resolution::Cancel.into(),
        OnConflict::Ask => ConflictPolicy::Ask(Arc::new(TerminalPrompt)),
    }
}

/// Runs one job in the foreground. Ctrl-C stops it at the next checkpoint.
pub async fn run_now(args: cli::run::Cli, settings: Settings) -> eyre::Result<()> {
    setup_logger(None)?;

    let store = commands::open_database(&settings)?;
    let job = store
        .get_job(&args.job)?
        .ok_or_else(|| eyre!("no job named '{}'", args.job))?;
    let daemon = commands::build_daemon(settings, store)?;

    let message = run_job(&daemon, job, conflict_policy(args.on_conflict)).await?;
    println!("{message}");
    Ok(())
}

/// Runs `job` to completion and returns its final message. A missing source fails the
/// run before anything is registered.
pub async fn run_job(
    daemon: &Daemon,
    job: JobDescriptor,
    policy: ConflictPolicy,
) -> eyre::Result<String> {
    let started_at = timestamp::now();
    if !job.source.exists() {
        daemon.fail_missing_source(&job, started_at)?;
        return Err(JobError::SourceMissing(job.source).into());
    }

    let request = BackupRequest::new(job)
        .policy(policy)
        .started_at(started_at);
    let started = daemon.start_backup(request);
    let cancel = started.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel(Reason::UserRequest);
        }
    });

    let finished = started.wait().await?;
    match finished.result {
        Ok(_) => Ok(finished.message),
        Err(_) => Err(eyre!(finished.message)),
    }
}

fn parse_time_of_day(s: &str) -> eyre::Result<(i64, i64)> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| eyre!("invalid time '{s}', expected HH:MM"))?;
    let hour = hour
        .trim()
        .parse()
        .map_err(|_| eyre!("invalid hour in '{s}'"))?;
    let minute = minute
        .trim()
        .parse()
        .map_err(|_| eyre!("invalid minute in '{s}'"))?;
    Ok((hour, minute))
}

fn schedule(args: &cli::job::Add) -> eyre::Result<Schedule> {
    let (hour, minute) = match &args.at {
        Some(at) => {
            let (hour, minute) = parse_time_of_day(at)?;
            (Some(hour), Some(minute))
        }
        None => (None, None),
    };
    Ok(Schedule::from_columns(&ScheduleColumns {
        kind: args.schedule.clone(),
        hour,
        minute: minute.or(args.minute),
        date: args.date.clone(),
        day_of_week: args.day.clone(),
    })?)
}

pub fn add(args: cli::job::Add, settings: &Settings) -> eyre::Result<()> {
    let definition = JobDefinition {
        schedule: schedule(&args)?,
        name: args.name,
        source: args.source,
        destination: args.destination,
        move_files: args.move_files,
        notify: args.email.map(Recipient),
    };
    let store = commands::open_database(settings)?;
    store.add_job(&definition)?;
    println!("added job '{}' ({})", definition.name, definition.schedule);
    Ok(())
}

pub fn remove(name: &str, settings: &Settings) -> eyre::Result<()> {
    let store = commands::open_database(settings)?;
    if !store.remove_job(name)? {
        eyre::bail!("no job named '{name}'");
    }
    println!("removed job '{name}'");
    Ok(())
}

fn format_ts(ts: Option<Timestamp>) -> String {
    ts.and_then(|ts| timestamp::format(&ts).ok())
        .unwrap_or_else(|| "-".to_owned())
}

fn describe(job: &JobDescriptor) -> String {
    let status = job
        .status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "Idle".to_owned());
    let last_run = match (job.last_run_at, job.last_run_outcome) {
        (Some(at), Some(outcome)) => format!("{} ({outcome})", format_ts(Some(at))),
        (at, _) => format_ts(at),
    };
    format!(
        "{}\n  source:      {}\n  destination: {}\n  schedule:    {}\n  status:      {status}\n  next run:    {}\n  last run:    {last_run}",
        job.name,
        job.source.display(),
        job.destination.name,
        job.schedule,
        format_ts(job.next_run_at),
    )
}

pub fn list(settings: &Settings) -> eyre::Result<()> {
    let store = commands::open_database(settings)?;
    let jobs = store.list_jobs()?;
    if jobs.is_empty() {
        println!("no jobs");
    }
    for job in &jobs {
        println!("{}", describe(job));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use packrat_core::schedule::{Minute, TimeOfDay};
    use std::path::PathBuf;

    fn add_args(schedule: &str) -> cli::job::Add {
        cli::job::Add {
            name: "Nightly".to_owned(),
            source: PathBuf::from("/home/user/documents"),
            destination: "usb".to_owned(),
            schedule: schedule.to_owned(),
            at: None,
            minute: None,
            date: None,
            day: None,
            email: None,
            move_files: false,
        }
    }

    #[test]
    fn should_build_daily_schedule_from_time_of_day() {
        let args = cli::job::Add {
            at: Some("02:00".to_owned()),
            ..add_args("daily")
        };

        assert_eq!(
            schedule(&args).unwrap(),
            Schedule::Daily {
                at: TimeOfDay::new(2, 0).unwrap()
            }
        );
    }

    #[test]
    fn should_build_hourly_schedule_from_minute() {
        let args = cli::job::Add {
            minute: Some(15),
            ..add_args("hourly")
        };

        assert_eq!(schedule(&args).unwrap(), Schedule::Hourly {
                minute: Minute::new(15).unwrap()
            });
    }

    #[test]
    fn should_require_date_for_once() {
        let args = cli::job::Add {
            at: Some("09:30".to_owned()),
            ..add_args("once")
        };

        assert!(schedule(&args).is_err());
    }

    #[test]
    fn should_reject_malformed_time_of_day() {
        assert!(parse_time_of_day("0200").is_err());
        assert!(parse_time_of_day("two:00").is_err());
        assert_eq!(parse_time_of_day("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn should_default_to_manual() {
        assert_eq!(schedule(&add_args("manual")).unwrap(), Schedule::Manual);
    }
}
