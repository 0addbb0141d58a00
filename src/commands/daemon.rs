use crate::{cli, commands};
use dirs_next as dirs;
use packrat_core::config::Settings;
use packrat_daemon::{scheduler::Scheduler, shutdown::Shutdown};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub(crate) fn setup_logger(log_file: Option<&Path>) -> eyre::Result<()> {
    use tracing::Level;
    use tracing_subscriber::{
        filter::LevelFilter,
        fmt::{format::FmtSpan, layer, time::LocalTime},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        Registry,
    };

    let builder = Registry::default()
        .with(LevelFilter::from(Level::INFO))
        .with(layer().with_ansi(true).with_target(false).without_time());

    if let Some(log_file) = log_file {
        let time_format = time::macros::format_description!(
            "[year]-[month]-[day] [hour repr:24]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        );

        let file = std::fs::File::options()
            .append(true)
            .create(true)
            .open(log_file)?;
        builder
            .with(
                layer()
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_timer(LocalTime::new(time_format))
                    .with_writer(file),
            )
            .try_init()?;
    } else {
        builder.try_init()?;
    }

    Ok(())
}

async fn log_file_dir() -> eyre::Result<PathBuf> {
    let log_file_dir = dirs::data_dir()
        .ok_or_else(|| eyre::eyre!("can't determine data directory for log file"))?
        .join("packrat");
    tokio::fs::create_dir_all(&log_file_dir).await?;
    Ok(log_file_dir)
}

pub async fn run(args: cli::daemon::Cli, settings: Settings) -> eyre::Result<()> {
    let log_file = match args.log_file {
        Some(log_file) => log_file,
        None => log_file_dir().await?.join("packrat.log"),
    };
    setup_logger(Some(&log_file))?;

    if let Some(version) = packrat_core::VERSION {
        tracing::info!("packrat: {}", version);
    }
    if let Some(source) = &settings.source {
        tracing::info!(config_file = %source.display(), "loaded configuration");
    }

    let store = commands::open_database(&settings)?;
    let daemon = commands::build_daemon(settings, store)?;

    let registry = daemon.registry.clone();
    daemon.notifier.add_listener(Arc::new(move || {
        for run in registry.list_running() {
            tracing::debug!(name = %run.payload.name(), status = %run.status, "run changed");
        }
    }));

    let shutdown = Shutdown::new();
    shutdown.request_on_ctrl_c();

    tracing::info!("running until interrupted...");
    Scheduler::new(daemon).run(shutdown).await
}
