use crate::registry::Registry;
use events::Notifier;
use packrat_core::cancellation::Reason;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// Stop signal shared by the scheduler and whoever decides the process should exit.
#[derive(Debug, Clone)]
pub struct Shutdown(Arc<watch::Sender<bool>>);

impl Default for Shutdown {
    fn default() -> Self {
        let (sender, _) = watch::channel(false);
        Shutdown(Arc::new(sender))
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn request(&self) {
        tracing::info!("shutdown requested");
        self.0.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        let mut receiver = self.0.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Requests shutdown on Ctrl-C.
    pub fn request_on_ctrl_c(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.request(),
                Err(error) => tracing::error!(%error, "failed to listen for ctrl-c"),
            }
        });
    }
}

/// Cancels every run and waits up to `grace_period` for the registry to empty. Returns
/// whether it did.
#[tracing::instrument(name = "shutdown", skip_all)]
pub async fn drain(registry: &Registry, notifier: &Notifier, grace_period: Duration) -> bool {
    let mut changes = notifier.subscribe();
    let cancelled = registry.request_cancel_all(Reason::Shutdown);
    tracing::info!(
        running = cancelled,
        grace_period_secs = grace_period.as_secs_f64(),
        "waiting for runs to stop"
    );
    let deadline = tokio::time::Instant::now() + grace_period;
    loop {
        if registry.is_empty() {
            return true;
        }
        tokio::select! {
            change = changes.recv() => {
                if change.is_err() {
                    return registry.is_empty();
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(
                    running = registry.len(),
                    "grace period elapsed before all runs stopped"
                );
                return false;
            }
        }
    }
}
