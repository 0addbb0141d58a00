use async_trait::async_trait;
use eyre::{bail, WrapErr};
use packrat_core::provider::{Provider, ProviderKind, RemoteId};
use std::{io, path::Path};

/// Plain directories on this machine. Remote folders and identifiers are absolute paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProvider;

#[async_trait]
impl Provider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn display_name(&self) -> &str {
        "Local"
    }

    async fn authenticate(&self) -> eyre::Result<bool> {
        Ok(true)
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn free_space(&self) -> eyre::Result<Option<u64>> {
        Ok(None)
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_folder: &str,
    ) -> eyre::Result<Option<RemoteId>> {
        let Some(file_name) = local_path.file_name() else {
            bail!("{} has no file name", local_path.display());
        };
        let folder = Path::new(remote_folder);
        tokio::fs::create_dir_all(folder)
            .await
            .wrap_err_with(|| format!("failed to create {}", folder.display()))?;
        let target = folder.join(file_name);
        tokio::fs::copy(local_path, &target)
            .await
            .wrap_err_with(|| format!("failed to copy {}", local_path.display()))?;
        Ok(Some(RemoteId(target.display().to_string())))
    }

    async fn download(&self, remote_id: &RemoteId, local_path: &Path) -> eyre::Result<bool> {
        match tokio::fs::copy(&remote_id.0, local_path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).wrap_err_with(|| format!("failed to copy {}", remote_id.0)),
        }
    }

    async fn remote_hash(&self, _remote_id: &RemoteId) -> eyre::Result<Option<String>> {
        Ok(None)
    }

    async fn delete(&self, remote_id: &RemoteId) -> eyre::Result<bool> {
        match tokio::fs::remove_file(&remote_id.0).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).wrap_err_with(|| format!("failed to delete {}", remote_id.0)),
        }
    }
}
