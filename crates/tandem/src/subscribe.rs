//! Update notifications.
//!
//! Subscribers are told *that* the state changed, not what it changed to;
//! they read the store again if they care.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Default)]
pub(crate) struct Subscribers {
    callbacks: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl Subscribers {
    pub(crate) fn add(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.callbacks.lock().push((id, callback));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Call every subscriber in subscription order.
    ///
    /// The list is snapshotted first, so callbacks may subscribe, unsubscribe or
    /// dispatch without deadlocking.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<Callback> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback();
        }
    }
}
