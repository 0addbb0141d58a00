use events::Notifier;
use packrat_core::{
    archive::{Extractor, Packager},
    config::Settings,
    mail::{LogMailer, Mailer},
    provider::Providers,
    store::JobStore,
};
use registry::Registry;
use stations::Stations;
use std::sync::Arc;

pub mod check;
pub mod job;
pub mod mail;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod stations;

#[cfg(test)]
pub(crate) mod test_support;

/// Everything a scheduler or a run needs, owned in one place instead of as process globals.
#[derive(Clone)]
pub struct Daemon {
    pub settings: Arc<Settings>,
    pub registry: Registry,
    pub notifier: Notifier,
    pub stations: Stations,
    pub store: Arc<dyn JobStore>,
    pub providers: Providers,
    pub packager: Arc<dyn Packager>,
    pub extractor: Arc<dyn Extractor>,
    pub mailer: Arc<dyn Mailer>,
}

impl Daemon {
    pub fn new(
        settings: Settings,
        store: Arc<dyn JobStore>,
        packager: Arc<dyn Packager>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let notifier = Notifier::default();
        Daemon {
            settings: Arc::new(settings),
            registry: Registry::new(notifier.clone()),
            notifier,
            stations: Stations::default(),
            store,
            providers: Providers::new(),
            packager,
            extractor,
            mailer: Arc::new(LogMailer),
        }
    }

    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_packager(mut self, packager: Arc<dyn Packager>) -> Self {
        self.packager = packager;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("stations", &self.stations)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
