use crate::{provider::ProviderKind, secrets::Secret};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Where archives for cloud destinations are built, and downloads for restores land.
    #[serde(alias = "staging_path")]
    pub staging_path: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub scheduler: Scheduler,
    pub smtp: Option<Smtp>,
    pub providers: Providers,

    /// path of the configuration file, if the configuration was loaded from a file
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Scheduler {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde", alias = "grace_period")]
    pub grace_period: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler {
            interval: Duration::from_secs(60),
            grace_period: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Smtp {
    pub host: String,
    #[serde(default = "Smtp::default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    pub from: String,
    #[serde(default = "Smtp::default_starttls")]
    pub starttls: bool,
}

impl Smtp {
    fn default_port() -> u16 {
        587
    }

    fn default_starttls() -> bool {
        true
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Providers {
    #[serde(alias = "google-drive")]
    pub gdrive: Option<SyncFolder>,
    pub onedrive: Option<SyncFolder>,
}

impl Providers {
    pub fn sync_folder(&self, kind: ProviderKind) -> Option<&SyncFolder> {
        match kind {
            ProviderKind::Local => None,
            ProviderKind::GoogleDrive => self.gdrive.as_ref(),
            ProviderKind::OneDrive => self.onedrive.as_ref(),
        }
    }
}

/// A cloud drive mounted into the local filesystem by its sync client.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncFolder {
    #[serde(alias = "sync_root")]
    pub sync_root: PathBuf,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("invalid configuration string")]
    InvalidConfigString(String, #[source] eyre::Report),
    #[error("invalid configuration file {}", .0.display())]
    InvalidConfigFile(PathBuf, #[source] eyre::Report),
    #[error("i/o error reading configuration file {}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),
}

impl Settings {
    pub fn parse(s: &str) -> Result<Settings, ConfigLoadError> {
        toml::from_str(s).map_err(|e| ConfigLoadError::InvalidConfigString(s.to_owned(), e.into()))
    }

    pub async fn parse_file(p: &Path) -> Result<Settings, ConfigLoadError> {
        let config_string = tokio::fs::read_to_string(p)
            .await
            .map_err(|e| ConfigLoadError::IoError(p.to_owned(), e))?;
        let mut settings: Settings = toml::from_str(&config_string)
            .map_err(|e| ConfigLoadError::InvalidConfigFile(p.to_owned(), e.into()))?;
        settings.source = Some(p.to_owned());
        Ok(settings)
    }
}
