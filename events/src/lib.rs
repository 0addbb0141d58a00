use parking_lot::{Mutex, RwLock};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};
use tokio::sync::broadcast;

/// A zero-argument callback run whenever the set of running jobs changes.
///
/// Listeners are identified by their `Arc` pointer, so keep the `Arc` around to remove one.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// An execution context listener calls are marshalled onto, e.g. a UI event loop.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, f: Box<dyn FnOnce() + Send>);
}

/// Tick broadcast to async subscribers on every change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Changed;

#[derive(Clone)]
pub struct Notifier(Arc<Shared>);

struct Shared {
    listeners: RwLock<Vec<Listener>>,
    dispatch: Mutex<Option<Arc<dyn Dispatch>>>,
    ticks: broadcast::Sender<Changed>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .field("dispatch", &self.0.dispatch.lock().is_some())
            .finish()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Notifier::new_with_capacity(16)
    }
}

impl Notifier {
    pub fn new_with_capacity(capacity: usize) -> Self {
        let (ticks, _) = broadcast::channel(capacity);
        Notifier(Arc::new(Shared {
            listeners: RwLock::new(Vec::new()),
            dispatch: Mutex::new(None),
            ticks,
        }))
    }

    /// Adds a listener unless the same `Arc` is already registered.
    pub fn add_listener(&self, listener: Listener) {
        let mut listeners = self.0.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Removes a listener; does nothing if it isn't registered.
    pub fn remove_listener(&self, listener: &Listener) {
        self.0
            .listeners
            .write()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.read().len()
    }

    pub fn set_dispatch(&self, dispatch: Option<Arc<dyn Dispatch>>) {
        *self.0.dispatch.lock() = dispatch;
    }

    pub fn subscribe(&self) -> Subscriber {
        Subscriber(self.0.ticks.subscribe())
    }

    /// Calls every listener and wakes subscribers.
    ///
    /// Must not be called with a lock held that listeners might take themselves.
    pub fn notify(&self) {
        let listeners = self.0.listeners.read().clone();
        let dispatch = self.0.dispatch.lock().clone();
        for listener in listeners {
            match &dispatch {
                Some(dispatch) => dispatch.dispatch(Box::new(move || invoke(&*listener))),
                None => invoke(&*listener),
            }
        }
        // no subscribers is fine
        let _ = self.0.ticks.send(Changed);
    }

    /// Runs a one-off callback the same way listeners are run.
    pub fn run(&self, f: Box<dyn FnOnce() + Send>) {
        let dispatch = self.0.dispatch.lock().clone();
        match dispatch {
            Some(dispatch) => dispatch.dispatch(Box::new(move || invoke(f))),
            None => invoke(f),
        }
    }
}

fn invoke(f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!("listener panicked");
    }
}

#[derive(Debug, thiserror::Error)]
#[error("notifier closed")]
pub struct NotifierClosed;

#[derive(Debug)]
pub struct Subscriber(broadcast::Receiver<Changed>);

impl Subscriber {
    /// Waits for the next change. Missed ticks are collapsed into one.
    pub async fn recv(&mut self) -> Result<Changed, NotifierClosed> {
        loop {
            match self.0.recv().await {
                Ok(item) => break Ok(item),
                Err(broadcast::error::RecvError::Closed) => break Err(NotifierClosed),
                Err(broadcast::error::RecvError::Lagged(lag)) => {
                    tracing::debug!(lag, "subscriber lagged behind");
                    break Ok(Changed);
                }
            }
        }
    }
}
