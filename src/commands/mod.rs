use crate::cli::ConfigFile;
use dirs_next as dirs;
use packrat_archive::{ZipExtractor, ZipPackager};
use packrat_core::config::{ConfigLoadError, Settings};
use packrat_daemon::{mail, providers, Daemon};
use packrat_store::Database;
use std::{path::PathBuf, sync::Arc};

pub mod check;
pub mod daemon;
pub mod destination;
pub mod files;
pub mod job;
mod prompt;

/// Reads the configuration file. A missing file means the defaults.
pub async fn load_settings(config_file: &ConfigFile) -> eyre::Result<Settings> {
    let Ok(path) = config_file.path() else {
        return Ok(Settings::default());
    };
    match Settings::parse_file(path).await {
        Ok(settings) => Ok(settings),
        Err(ConfigLoadError::IoError(_, e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(config_file = %path.display(), "no configuration file, using defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn database_path(settings: &Settings) -> eyre::Result<PathBuf> {
    match &settings.database {
        Some(path) => Ok(path.clone()),
        None => Ok(dirs::data_dir()
            .ok_or_else(|| eyre::eyre!("can't determine data directory for the database"))?
            .join("packrat")
            .join("packrat.sqlite")),
    }
}

pub fn open_database(settings: &Settings) -> eyre::Result<Arc<Database>> {
    Ok(Arc::new(Database::open(&database_path(settings)?)?))
}

/// Wires the zip archiver, configured providers and mailer around `store`.
pub fn build_daemon(settings: Settings, store: Arc<Database>) -> eyre::Result<Daemon> {
    let providers = providers::from_settings(&settings.providers);
    let mailer = mail::from_settings(settings.smtp.as_ref())?;
    Ok(
        Daemon::new(settings, store, Arc::new(ZipPackager), Arc::new(ZipExtractor))
            .with_providers(providers)
            .with_mailer(mailer),
    )
}

pub fn config(settings: &Settings) -> eyre::Result<()> {
    print!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}

pub fn version() -> eyre::Result<()> {
    if let Some(version) = packrat_core::VERSION {
        println!("packrat: {}", version);
    } else {
        println!("packrat: [untagged build]")
    }
    Ok(())
}
