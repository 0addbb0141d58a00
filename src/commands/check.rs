use super::daemon::setup_logger;
use crate::{cli, commands};
use packrat_core::{config::Settings, model::Recipient};
use packrat_daemon::check::CheckResult;

fn describe(result: &CheckResult) -> String {
    let mut line = format!("{}\t{}\t{}", result.station, result.subject, result.health);
    if let Some(detail) = &result.detail {
        line.push('\t');
        line.push_str(detail);
    }
    line
}

/// Self-tests packaging, every cloud destination and, optionally, email delivery.
pub async fn run(args: cli::check::Cli, settings: Settings) -> eyre::Result<()> {
    setup_logger(None)?;

    let store = commands::open_database(&settings)?;
    let destinations = store.destinations()?;
    let daemon = commands::build_daemon(settings, store)?;
    let recipient = args.email.map(Recipient);

    let report = daemon
        .check_stations(&destinations, recipient.as_ref())
        .await?;
    for result in &report.results {
        println!("{}", describe(result));
    }
    if !report.passed() {
        eyre::bail!("one or more checks failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use packrat_daemon::stations::{Health, Station};

    #[test]
    fn should_describe_failures_with_their_detail() {
        let result = CheckResult {
            station: Station::Shipping,
            subject: "drive".to_owned(),
            health: Health::Failed,
            detail: Some("no gdrive provider configured".to_owned()),
        };

        assert_eq!(
            describe(&result),
            "shipping\tdrive\tfailed\tno gdrive provider configured"
        );
    }

    #[test]
    fn should_describe_passed_checks() {
        let result = CheckResult {
            station: Station::Packing,
            subject: "test archive".to_owned(),
            health: Health::Ready,
            detail: None,
        };

        assert_eq!(describe(&result), "packing\ttest archive\tready");
    }
}
