use events::Notifier;
use parking_lot::Mutex;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// A stage every backup passes through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Station {
    Packing,
    Scheduling,
    Shipping,
    Notification,
}

impl Station {
    pub const ALL: [Station; 4] = [
        Station::Packing,
        Station::Scheduling,
        Station::Shipping,
        Station::Notification,
    ];
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Station::Packing => "packing",
            Station::Scheduling => "scheduling",
            Station::Shipping => "shipping",
            Station::Notification => "notification",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Health {
    /// Not checked or used yet.
    #[default]
    Unknown,
    Ready,
    Busy,
    /// Worked, but left something behind that needs a look.
    Degraded,
    Failed,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Health::Unknown => "unknown",
            Health::Ready => "ready",
            Health::Busy => "busy",
            Health::Degraded => "degraded",
            Health::Failed => "failed",
        })
    }
}

/// Health of each station. Listeners on the notifier hear about every change.
#[derive(Debug, Clone)]
pub struct Stations {
    health: Arc<Mutex<BTreeMap<Station, Health>>>,
    notifier: Notifier,
}

impl Default for Stations {
    fn default() -> Self {
        Stations::new(Notifier::default())
    }
}

impl Stations {
    pub fn new(notifier: Notifier) -> Self {
        let health = Station::ALL
            .into_iter()
            .map(|station| (station, Health::Unknown))
            .collect();
        Stations {
            health: Arc::new(Mutex::new(health)),
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn set(&self, station: Station, health: Health) {
        let previous = self.health.lock().insert(station, health);
        if previous != Some(health) {
            tracing::info!(%station, %health, "station status changed");
            self.notifier.notify();
        }
    }

    pub fn get(&self, station: Station) -> Health {
        self.health.lock().get(&station).copied().unwrap_or_default()
    }

    pub fn all(&self) -> BTreeMap<Station, Health> {
        self.health.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn should_start_unknown() {
        let stations = Stations::default();

        assert!(stations.all().values().all(|health| *health == Health::Unknown));
        assert_eq!(stations.all().len(), 4);
    }

    #[test]
    fn should_notify_only_on_change() {
        let notifier = Notifier::default();
        let count = Arc::new(AtomicUsize::new(0));
        let listener_count = count.clone();
        notifier.add_listener(Arc::new(move || {
            listener_count.fetch_add(1, Ordering::SeqCst);
        }));
        let stations = Stations::new(notifier);

        stations.set(Station::Packing, Health::Busy);
        stations.set(Station::Packing, Health::Busy);
        stations.set(Station::Packing, Health::Ready);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(stations.get(Station::Packing), Health::Ready);
        assert_eq!(stations.get(Station::Shipping), Health::Unknown);
    }
}
