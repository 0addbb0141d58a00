use async_trait::async_trait;
use eyre::{bail, WrapErr};
use packrat_core::{
    config::SyncFolder,
    provider::{Provider, ProviderKind, RemoteId},
};
use std::{
    io,
    path::{Component, Path, PathBuf},
};

/// A cloud drive that its desktop client mirrors into a local directory.
///
/// Remote folders and identifiers are `/`-separated paths below the sync root.
#[derive(Debug, Clone)]
pub struct SyncFolderProvider {
    kind: ProviderKind,
    root: PathBuf,
    display_name: String,
}

impl SyncFolderProvider {
    pub fn new(kind: ProviderKind, root: impl Into<PathBuf>) -> Self {
        let display_name = match kind {
            ProviderKind::GoogleDrive => "Google Drive",
            ProviderKind::OneDrive => "OneDrive",
            ProviderKind::Local => "Local",
        }
        .to_owned();
        SyncFolderProvider {
            kind,
            root: root.into(),
            display_name,
        }
    }

    pub fn from_config(kind: ProviderKind, folder: &SyncFolder) -> Self {
        let mut provider = SyncFolderProvider::new(kind, &folder.sync_root);
        if let Some(name) = &folder.display_name {
            provider.display_name = name.clone();
        }
        provider
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> eyre::Result<PathBuf> {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!("'{}' is not a path inside the sync folder", relative.display());
        }
        Ok(self.root.join(relative))
    }

    async fn root_exists(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Provider for SyncFolderProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn authenticate(&self) -> eyre::Result<bool> {
        let mounted = self.root_exists().await;
        if !mounted {
            tracing::warn!(root = %self.root.display(), "sync folder is not mounted");
        }
        Ok(mounted)
    }

    async fn is_authenticated(&self) -> bool {
        self.root_exists().await
    }

    async fn free_space(&self) -> eyre::Result<Option<u64>> {
        // sync clients don't expose the remote quota locally
        Ok(None)
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_folder: &str,
    ) -> eyre::Result<Option<RemoteId>> {
        let file_name = match local_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => bail!("{} has no file name", local_path.display()),
        };
        let folder = remote_folder.trim_matches('/');
        let id = if folder.is_empty() {
            file_name
        } else {
            format!("{folder}/{file_name}")
        };
        let target = self.resolve(&id)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        let copied = tokio::fs::copy(local_path, &target)
            .await
            .wrap_err_with(|| format!("failed to copy {} into the sync folder", local_path.display()))?;
        tracing::info!(%id, bytes = copied, provider = %self.display_name, "uploaded");
        Ok(Some(RemoteId(id)))
    }

    async fn download(&self, remote_id: &RemoteId, local_path: &Path) -> eyre::Result<bool> {
        let source = self.resolve(&remote_id.0)?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        match tokio::fs::copy(&source, local_path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).wrap_err_with(|| format!("failed to download {}", remote_id.0)),
        }
    }

    async fn remote_hash(&self, _remote_id: &RemoteId) -> eyre::Result<Option<String>> {
        Ok(None)
    }

    async fn delete(&self, remote_id: &RemoteId) -> eyre::Result<bool> {
        let path = self.resolve(&remote_id.0)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).wrap_err_with(|| format!("failed to delete {}", remote_id.0)),
        }
    }
}
