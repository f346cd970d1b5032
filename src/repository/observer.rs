//! Change notification
//!
//! Listeners get a payload-free "something changed" signal after every
//! successful mutation and re-read the full state themselves.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, StoreError};

/// A change listener
///
/// `notify` is called on the mutating thread and must not block. It runs
/// under the registry's read lock, so it must not register or unregister
/// observers itself; reading the repository is fine.
pub trait Observer: Send + Sync {
    fn notify(&self);
}

/// Subscription handle returned by registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Registry of active listeners
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<(ObserverId, Arc<dyn Observer>)>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; the same `Arc` may only be registered once
    pub fn register(&self, observer: Arc<dyn Observer>) -> Result<ObserverId> {
        let mut observers = self.observers.write();
        if observers.iter().any(|(_, o)| same_listener(o, &observer)) {
            return Err(StoreError::AlreadyRegistered);
        }
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        observers.push((id, observer));
        Ok(id)
    }

    /// Remove a listener, returning whether it was present
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    /// Signal every listener once
    pub fn notify_all(&self) {
        let observers = self.observers.read();
        for (id, observer) in observers.iter() {
            trace!(observer = %id, "Notifying observer");
            observer.notify();
        }
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_listener(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Observer that forwards signals into a single-slot channel
///
/// A signal sent while one is already pending is dropped: the receiver
/// reads full state anyway, so only the wake-up count is lost.
pub struct ChannelObserver {
    tx: mpsc::Sender<()>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end
    pub fn channel() -> (Arc<Self>, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Arc::new(Self { tx }), rx)
    }
}

impl Observer for ChannelObserver {
    fn notify(&self) {
        // Full or closed: either way the pending signal (or shutdown) covers it
        let _ = self.tx.try_send(());
    }
}
