use packrat_archive::{ZipExtractor, ZipPackager};
use packrat_core::{
    config::{Settings, SyncFolder},
    provider::ProviderKind,
    schedule::Schedule,
};
use packrat_daemon::{providers, Daemon};
use packrat_store::{Database, JobDefinition};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// A scratch directory laid out like a small installation: a source tree, a USB stick,
/// a staging directory, a mounted cloud drive and the database file.
pub struct Workdir {
    dir: tempfile::TempDir,
}

impl Workdir {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::TempDir::new()?;
        let source = dir.path().join("documents");
        std::fs::create_dir_all(source.join("taxes"))?;
        std::fs::write(source.join("notes.txt"), "remember the milk")?;
        std::fs::write(source.join("taxes").join("2023.csv"), "a,b,c")?;
        for sub in ["usb", "staging", "drive", "restored"] {
            std::fs::create_dir(dir.path().join(sub))?;
        }
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.path().join("documents")
    }

    pub fn usb(&self) -> PathBuf {
        self.path().join("usb")
    }

    pub fn staging(&self) -> PathBuf {
        self.path().join("staging")
    }

    pub fn drive(&self) -> PathBuf {
        self.path().join("drive")
    }

    pub fn restored(&self) -> PathBuf {
        self.path().join("restored")
    }

    pub fn settings(&self) -> Settings {
        Settings {
            staging_path: Some(self.staging()),
            database: Some(self.path().join("packrat.sqlite")),
            providers: packrat_core::config::Providers {
                gdrive: Some(SyncFolder {
                    sync_root: self.drive(),
                    display_name: Some("Google Drive".to_owned()),
                }),
                onedrive: None,
            },
            ..Default::default()
        }
    }

    pub fn database(&self) -> eyre::Result<Arc<Database>> {
        packrat::commands::open_database(&self.settings())
    }

    /// The engine as the binary wires it, minus SMTP.
    pub fn daemon(&self, store: Arc<Database>) -> Daemon {
        let settings = self.settings();
        let providers = providers::from_settings(&settings.providers);
        Daemon::new(settings, store, Arc::new(ZipPackager), Arc::new(ZipExtractor))
            .with_providers(providers)
    }

    /// Adds the `usb` and `drive` destinations and returns the store.
    pub fn with_destinations(&self) -> eyre::Result<Arc<Database>> {
        let store = self.database()?;
        store.add_destination("usb", &self.usb().to_string_lossy(), ProviderKind::Local)?;
        store.add_destination("drive", "Backups", ProviderKind::GoogleDrive)?;
        Ok(store)
    }
}

pub fn job(name: &str, source: &Path, destination: &str, schedule: Schedule) -> JobDefinition {
    JobDefinition {
        name: name.to_owned(),
        source: source.to_owned(),
        destination: destination.to_owned(),
        move_files: false,
        schedule,
        notify: None,
    }
}

/// Waits until every run the daemon started has left its registry.
pub async fn wait_until_idle(daemon: &Daemon) -> eyre::Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !daemon.registry.is_empty() {
        if tokio::time::Instant::now() > deadline {
            eyre::bail!("{} runs still registered", daemon.registry.len());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
