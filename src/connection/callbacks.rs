//! Callback registries
//!
//! Each registry is an ordered list of shared closures. Registration hands
//! back a [`Subscription`] that can later remove exactly that closure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub(crate) struct CallbackRegistry<E: ?Sized> {
    entries: Mutex<Vec<(u64, Callback<E>)>>,
    next_id: AtomicU64,
}

impl<E: ?Sized + 'static> CallbackRegistry<E> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        })
    }

    pub(crate) fn register(self: &Arc<Self>, callback: Callback<E>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));

        let registry: Weak<dyn Deregister> = Arc::downgrade(self) as Weak<dyn Deregister>;
        Subscription { registry, id }
    }

    /// Invoke every callback in registration order.
    ///
    /// The list is snapshotted first so callbacks may register, deregister
    /// or call back into the manager.
    pub(crate) fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in snapshot {
            callback(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

trait Deregister: Send + Sync {
    fn deregister(&self, id: u64) -> bool;
}

impl<E: ?Sized + 'static> Deregister for CallbackRegistry<E> {
    fn deregister(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Handle returned by every callback registration.
///
/// Dropping it leaves the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    registry: Weak<dyn Deregister>,
    id: u64,
}

impl Subscription {
    /// Remove the callback. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.deregister(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
