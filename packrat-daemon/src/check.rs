use crate::{
    job::{ensure_authenticated, send_mail},
    registry::RunId,
    stations::{Health, Station},
    Daemon,
};
use eyre::eyre;
use packrat_core::{
    archive::PackOutcome,
    cancellation::Token,
    conflict::Resolution,
    mail::MailMessage,
    model::{Destination, Recipient},
};
use std::path::Path;

/// Outcome of one self-test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub station: Station,
    /// What was exercised, e.g. a destination name.
    pub subject: String,
    pub health: Health,
    pub detail: Option<String>,
}

impl CheckResult {
    fn new(station: Station, subject: impl Into<String>, result: eyre::Result<Health>) -> Self {
        let subject = subject.into();
        match result {
            Ok(health) => CheckResult {
                station,
                subject,
                health,
                detail: None,
            },
            Err(error) => {
                tracing::error!(%station, %subject, error = %format!("{error:#}"), "check failed");
                CheckResult {
                    station,
                    subject,
                    health: Health::Failed,
                    detail: Some(format!("{error:#}")),
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub results: Vec<CheckResult>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.results
            .iter()
            .all(|result| result.health != Health::Failed)
    }

    /// The worst health recorded for `station`, if it was checked at all.
    pub fn health(&self, station: Station) -> Option<Health> {
        self.results
            .iter()
            .filter(|result| result.station == station)
            .map(|result| result.health)
            .max_by_key(severity)
    }
}

fn severity(health: &Health) -> u8 {
    match health {
        Health::Unknown => 0,
        Health::Ready => 1,
        Health::Busy => 2,
        Health::Degraded => 3,
        Health::Failed => 4,
    }
}

impl Daemon {
    /// Packs a test archive, round-trips a test file through every cloud destination and,
    /// given a recipient, sends a test email. Station health is updated from the results.
    #[tracing::instrument(name = "check", skip_all)]
    pub async fn check_stations(
        &self,
        destinations: &[Destination],
        mail_to: Option<&Recipient>,
    ) -> eyre::Result<CheckReport> {
        let scratch = self
            .settings
            .staging_path
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("packrat-check-{}", RunId::new()));
        tokio::fs::create_dir_all(&scratch).await?;

        let mut report = CheckReport::default();
        report.results.push(CheckResult::new(
            Station::Packing,
            "test archive",
            self.pack_test_archive(&scratch).await,
        ));
        report
            .results
            .extend(self.check_shipping(&scratch, destinations).await);
        if let Some(recipient) = mail_to {
            let sent = send_mail(self, test_message(), recipient)
                .await
                .map(|()| Health::Ready);
            report
                .results
                .push(CheckResult::new(Station::Notification, &recipient.0, sent));
        }

        if let Err(error) = tokio::fs::remove_dir_all(&scratch).await {
            tracing::warn!(%error, path = %scratch.display(), "failed to remove check directory");
        }
        for station in Station::ALL {
            if let Some(health) = report.health(station) {
                self.stations.set(station, health);
            }
        }
        Ok(report)
    }

    async fn pack_test_archive(&self, scratch: &Path) -> eyre::Result<Health> {
        let source = scratch.join("packing-check");
        tokio::fs::create_dir_all(&source).await?;
        tokio::fs::write(source.join("packing_test_file.txt"), "This is a test.").await?;

        let packager = self.packager.clone();
        let output_root = scratch.to_owned();
        let outcome = tokio::task::spawn_blocking(move || {
            packager.pack(
                &source,
                &output_root,
                &Resolution::Overwrite.into(),
                &Token::new(),
            )
        })
        .await??;
        match outcome {
            PackOutcome::Packed(package) if package.path.is_file() => {
                tracing::info!(archive = %package.path.display(), "packing check passed");
                Ok(Health::Ready)
            }
            _ => Err(eyre!("test archive was not created")),
        }
    }

    async fn check_shipping(&self, scratch: &Path, destinations: &[Destination]) -> Vec<CheckResult> {
        let cloud = destinations
            .iter()
            .filter(|destination| !destination.is_local())
            .collect::<Vec<_>>();
        if cloud.is_empty() {
            tracing::info!("no cloud destinations configured, skipping shipping check");
            return vec![CheckResult::new(
                Station::Shipping,
                "no cloud destinations",
                Ok(Health::Ready),
            )];
        }

        let file = scratch.join("shipping_test_file.txt");
        if let Err(error) = tokio::fs::write(&file, "This is a shipping test file.").await {
            return vec![CheckResult::new(
                Station::Shipping,
                "test file",
                Err(error.into()),
            )];
        }
        let mut results = Vec::with_capacity(cloud.len());
        for destination in cloud {
            let shipped = self.ship_test_file(destination, &file).await;
            results.push(CheckResult::new(
                Station::Shipping,
                &destination.name,
                shipped,
            ));
        }
        results
    }

    async fn ship_test_file(&self, destination: &Destination, file: &Path) -> eyre::Result<Health> {
        let provider = self
            .providers
            .get(destination.provider)
            .ok_or_else(|| eyre!("no {} provider configured", destination.provider))?;
        ensure_authenticated(&*provider).await?;
        tracing::info!(destination = %destination.name, provider = provider.display_name(), "uploading test file");
        let remote_id = provider
            .upload(file, &destination.location)
            .await?
            .ok_or_else(|| eyre!("upload to {} returned no identifier", provider.display_name()))?;

        match provider.delete(&remote_id).await {
            Ok(true) => Ok(Health::Ready),
            Ok(false) => {
                tracing::warn!(remote_id = %remote_id.0, destination = %destination.name, "test file was not deleted, remove it by hand");
                Ok(Health::Degraded)
            }
            Err(error) => {
                tracing::warn!(%error, remote_id = %remote_id.0, destination = %destination.name, "failed to delete test file, remove it by hand");
                Ok(Health::Degraded)
            }
        }
    }
}

fn test_message() -> MailMessage {
    MailMessage {
        subject: "packrat check".to_owned(),
        body: "This is a test message. Email notifications are working.".to_owned(),
    }
}
