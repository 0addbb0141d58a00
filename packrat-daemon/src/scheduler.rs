use crate::{
    job::BackupRequest,
    shutdown,
    shutdown::Shutdown,
    stations::{Health, Station},
    Daemon,
};
use packrat_core::{timestamp, Timestamp};
use std::time::Duration;
use tracing::info;

/// What one scheduler pass did.
#[derive(Debug, Default)]
pub struct PassReport {
    pub started: Vec<String>,
    /// Due jobs that were not started because their source is missing.
    pub preflight_failed: Vec<String>,
    /// Due jobs skipped because a run of them is still registered.
    pub already_running: Vec<String>,
    pub errors: Vec<(String, eyre::Report)>,
}

/// Starts due jobs on a fixed interval.
#[derive(Debug)]
pub struct Scheduler {
    daemon: Daemon,
    interval: Duration,
}

impl Scheduler {
    pub fn new(daemon: Daemon) -> Self {
        let interval = daemon.settings.scheduler.interval;
        Scheduler { daemon, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Reads every job and starts the ones due at `now`.
    pub fn run_pass(&self, now: Timestamp) -> eyre::Result<PassReport> {
        let jobs = self.daemon.store.list_jobs().map_err(|error| {
            self.daemon.stations.set(Station::Scheduling, Health::Failed);
            error
        })?;
        self.daemon.stations.set(Station::Scheduling, Health::Ready);
        let mut report = PassReport::default();
        for job in jobs.into_iter().filter(|job| job.is_due(now)) {
            if self.daemon.registry.is_job_running(&job.name) {
                tracing::debug!(job = %job.name, "already running, skipping");
                report.already_running.push(job.name);
                continue;
            }
            if !job.source.exists() {
                match self.daemon.fail_missing_source(&job, now) {
                    Ok(()) => report.preflight_failed.push(job.name),
                    Err(error) => report.errors.push((job.name, error)),
                }
                continue;
            }
            info!(job = %job.name, next_run_at = ?job.next_run_at, "scheduling");
            let name = job.name.clone();
            self.daemon
                .start_backup(BackupRequest::new(job).started_at(now));
            report.started.push(name);
        }
        Ok(report)
    }

    /// Runs passes until `shutdown` fires, then stops every run within the grace period.
    #[tracing::instrument(name = "scheduler", skip_all)]
    pub async fn run(self, shutdown: Shutdown) -> eyre::Result<()> {
        info!(
            interval = %humantime::format_duration(self.interval),
            "scheduler started"
        );
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    match self.run_pass(timestamp::now()) {
                        Ok(report) => {
                            for (job, error) in &report.errors {
                                tracing::error!(%job, error = %format!("{error:#}"), "failed to schedule job");
                            }
                            if !report.started.is_empty() {
                                tracing::debug!(started = ?report.started, "pass finished");
                            }
                        }
                        Err(error) => tracing::error!(error = %format!("{error:#}"), "scheduler pass failed"),
                    }
                }
                _ = shutdown.requested() => break,
            }
        }
        let drained = shutdown::drain(
            &self.daemon.registry,
            &self.daemon.notifier,
            self.daemon.settings.scheduler.grace_period,
        )
        .await;
        self.daemon.stations.set(Station::Scheduling, Health::Unknown);
        info!(drained, "scheduler stopped");
        Ok(())
    }
}
