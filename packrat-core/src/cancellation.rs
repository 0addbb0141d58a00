use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Stopped on request, e.g. from the UI or `stop`.
    UserRequest,
    Shutdown,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::UserRequest => f.write_str("stop requested"),
            Reason::Shutdown => f.write_str("shutting down"),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    reason: Mutex<Option<Reason>>,
}

/// Cooperative cancellation signal for one run.
///
/// Setting it never interrupts anything by itself; the run checks it between phases and
/// for every file it packs or extracts.
#[derive(Debug, Clone, Default)]
pub struct Token(Arc<Shared>);

impl Token {
    pub fn new() -> Self {
        Default::default()
    }

    /// Marks the token as cancelled. The first reason given wins.
    pub fn cancel(&self, reason: Reason) {
        let mut current = self.0.reason.lock();
        if current.is_none() {
            *current = Some(reason);
        }
        self.0.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<Reason> {
        *self.0.reason.lock()
    }

    /// Returns `Err(Cancelled)` once the token is set, for use with `?` at checkpoints.
    pub fn check(&self) -> Result<(), Cancelled> {
        match self.reason() {
            Some(reason) if self.is_cancelled() => Err(Cancelled(reason)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cancelled ({0})")]
pub struct Cancelled(pub Reason);
