use crate::commands;
use packrat_core::{
    config::Settings,
    model::Destination,
    provider::{ProviderKind, Providers},
};
use packrat_daemon::providers;
use std::path::Path;

pub fn add(name: &str, location: &str, provider: &str, settings: &Settings) -> eyre::Result<()> {
    let provider: ProviderKind = provider.parse()?;
    if provider == ProviderKind::Local && !Path::new(location).is_absolute() {
        eyre::bail!("local destinations need an absolute path, got '{location}'");
    }
    let store = commands::open_database(settings)?;
    store.add_destination(name, location, provider)?;
    println!("added destination '{name}' ({provider})");
    Ok(())
}

pub fn remove(name: &str, settings: &Settings) -> eyre::Result<()> {
    let store = commands::open_database(settings)?;
    if !store.remove_destination(name)? {
        eyre::bail!("no destination named '{name}'");
    }
    println!("removed destination '{name}'");
    Ok(())
}

async fn availability(destination: &Destination, providers: &Providers) -> &'static str {
    let Some(provider) = providers.get(destination.provider) else {
        return "not configured";
    };
    if !provider.is_authenticated().await {
        return "unavailable";
    }
    if destination.is_local() && !Path::new(&destination.location).is_dir() {
        return "missing";
    }
    "ok"
}

pub async fn list(settings: &Settings) -> eyre::Result<()> {
    let store = commands::open_database(settings)?;
    let providers = providers::from_settings(&settings.providers);
    let destinations = store.destinations()?;
    if destinations.is_empty() {
        println!("no destinations");
    }
    for destination in &destinations {
        println!(
            "{}\t{}\t{}\t{}",
            destination.name,
            destination.provider,
            destination.location,
            availability(destination, &providers).await,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use packrat_core::{config::SyncFolder, model::DestinationId};

    fn destination(provider: ProviderKind, location: &str) -> Destination {
        Destination {
            id: DestinationId(1),
            name: "target".to_owned(),
            location: location.to_owned(),
            provider,
        }
    }

    #[tokio::test]
    async fn should_report_local_destinations_by_directory() {
        let dir = tempfile::tempdir().unwrap();
        let providers = providers::from_settings(&Default::default());
        let present = destination(ProviderKind::Local, &dir.path().to_string_lossy());
        let missing = destination(
            ProviderKind::Local,
            &dir.path().join("gone").to_string_lossy(),
        );

        assert_eq!(availability(&present, &providers).await, "ok");
        assert_eq!(availability(&missing, &providers).await, "missing");
    }

    #[tokio::test]
    async fn should_report_cloud_destinations_by_provider() {
        let dir = tempfile::tempdir().unwrap();
        let providers = providers::from_settings(&packrat_core::config::Providers {
            gdrive: Some(SyncFolder {
                sync_root: dir.path().to_owned(),
                display_name: None,
            }),
            onedrive: Some(SyncFolder {
                sync_root: dir.path().join("not-mounted"),
                display_name: None,
            }),
        });

        assert_eq!(
            availability(&destination(ProviderKind::GoogleDrive, "Backups"), &providers).await,
            "ok"
        );
        assert_eq!(
            availability(&destination(ProviderKind::OneDrive, "Backups"), &providers).await,
            "unavailable"
        );
        assert_eq!(
            availability(
                &destination(ProviderKind::GoogleDrive, "Backups"),
                &providers::from_settings(&Default::default())
            )
            .await,
            "not configured"
        );
    }
}
