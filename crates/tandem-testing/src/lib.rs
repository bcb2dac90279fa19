//! Testing utilities for tandem stores.
//!
//! ```ignore
//! let store = Store::new(state, mutations, actions);
//! let recorder = NotificationRecorder::attach(&store);
//!
//! store.dispatch("todos.add", json!("buy milk"))?;
//! settle_within(&store, Duration::from_secs(1)).await?;
//!
//! assert_eq!(recorder.count(), 2);
//! assert_eq!(recorder.snapshots().last().unwrap().todos, vec!["buy milk"]);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tandem_core::{Store, StoreError, Subscription};

/// Records a copy of the state every time the store notifies.
pub struct NotificationRecorder<S> {
    snapshots: Arc<Mutex<Vec<S>>>,
    subscription: Subscription<S>,
}

impl<S: Clone + Send + Sync + 'static> NotificationRecorder<S> {
    pub fn attach(store: &Store<S>) -> Self {
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        let reader = store.clone();
        let subscription = store.subscribe(move || sink.lock().push(reader.state()));
        Self {
            snapshots,
            subscription,
        }
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn snapshots(&self) -> Vec<S> {
        self.snapshots.lock().clone()
    }

    /// Stop recording and return everything seen so far.
    pub fn detach(self) -> Vec<S> {
        self.subscription.unsubscribe();
        std::mem::take(&mut *self.snapshots.lock())
    }
}

/// Why a store failed to settle cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleError {
    /// Effects were still in flight when the deadline passed.
    TimedOut { in_flight: usize },
    /// Every effect settled, but some redispatches failed.
    Unhandled(Vec<StoreError>),
}

impl std::fmt::Display for SettleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettleError::TimedOut { in_flight } => {
                write!(f, "store did not settle, {in_flight} effects in flight")
            }
            SettleError::Unhandled(errors) => {
                write!(f, "{} redispatches failed", errors.len())?;
                for error in errors {
                    write!(f, "; {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SettleError {}

/// Wait for every in-flight effect to settle, failing on timeout or on any
/// unhandled redispatch error.
pub async fn settle_within<S: Send + Sync + 'static>(
    store: &Store<S>,
    limit: Duration,
) -> Result<(), SettleError> {
    if tokio::time::timeout(limit, store.settled()).await.is_err() {
        return Err(SettleError::TimedOut {
            in_flight: store.in_flight(),
        });
    }
    let unhandled = store.take_unhandled();
    if unhandled.is_empty() {
        Ok(())
    } else {
        Err(SettleError::Unhandled(unhandled))
    }
}
