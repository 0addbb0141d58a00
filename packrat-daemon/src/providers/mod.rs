use packrat_core::{
    config,
    provider::{ProviderKind, Providers},
};
use std::sync::Arc;

mod local;
mod sync_folder;

pub use local::LocalProvider;
pub use sync_folder::SyncFolderProvider;

/// Providers for every destination kind the configuration can serve.
pub fn from_settings(settings: &config::Providers) -> Providers {
    let mut providers = Providers::new().with(Arc::new(LocalProvider));
    for (kind, folder) in [
        (ProviderKind::GoogleDrive, &settings.gdrive),
        (ProviderKind::OneDrive, &settings.onedrive),
    ] {
        if let Some(folder) = folder {
            providers.insert(Arc::new(SyncFolderProvider::from_config(kind, folder)));
        }
    }
    providers
}

/// Turns a remote identifier into a single file name usable in the staging directory.
pub(crate) fn staging_file_name(id: &str) -> String {
    let name = id.replace(['/', '\\', ':'], "_");
    if name.is_empty() {
        "download".to_owned()
    } else {
        name
    }
}
