//! The store and its dispatch loop.
//!
//! `dispatch` is the only writer of state:
//!
//! ```text
//! dispatch(name, payload)
//!     │
//!     ├─► actions["a.b.c"]   ─► Response { state?, effect?, effects }
//!     │        or
//!     ├─► mutations["a.b.c"] ─► Response { state }
//!     │
//!     ├─► replace state, notify subscribers        (synchronous)
//!     │
//!     └─► spawn each effect ─► resolve ─► dispatch(label, value)
//! ```
//!
//! Effects run on the ambient tokio runtime. Their redispatch re-enters the
//! same loop, so an effect can lead to further state changes and effects.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::config::{MissingLabelPolicy, StoreConfig};
use crate::effect::{Effect, Outcome};
use crate::error::{Result, Settlement, StoreError};
use crate::inflight::InflightTracker;
use crate::response::Response;
use crate::subscribe::{Subscribers, SubscriptionId};
use crate::table::{Actions, Mutations};

struct Inner<S> {
    config: StoreConfig,
    state: RwLock<S>,
    mutations: Mutations<S>,
    actions: Actions<S>,
    subscribers: Subscribers,
    inflight: Arc<InflightTracker>,
    unhandled: Mutex<Vec<StoreError>>,
}

/// Shared handle to application state plus the tables that change it.
///
/// Cloning is cheap; every clone refers to the same state.
pub struct Store<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("mutations", &self.inner.mutations)
            .field("actions", &self.inner.actions)
            .field("in_flight", &self.inner.inflight.count())
            .finish()
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder<S> {
    state: S,
    mutations: Mutations<S>,
    actions: Actions<S>,
    config: StoreConfig,
}

impl<S: Send + Sync + 'static> StoreBuilder<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            mutations: Mutations::new(),
            actions: Actions::new(),
            config: StoreConfig::default(),
        }
    }

    pub fn mutations(mut self, mutations: Mutations<S>) -> Self {
        self.mutations = mutations;
        self
    }

    pub fn actions(mut self, actions: Actions<S>) -> Self {
        self.actions = actions;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Store<S> {
        Store {
            inner: Arc::new(Inner {
                config: self.config,
                state: RwLock::new(self.state),
                mutations: self.mutations,
                actions: self.actions,
                subscribers: Subscribers::default(),
                inflight: Arc::new(InflightTracker::default()),
                unhandled: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<S: Send + Sync + 'static> Store<S> {
    pub fn new(state: S, mutations: Mutations<S>, actions: Actions<S>) -> Self {
        StoreBuilder::new(state)
            .mutations(mutations)
            .actions(actions)
            .build()
    }

    pub fn builder(state: S) -> StoreBuilder<S> {
        StoreBuilder::new(state)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// A copy of the current state.
    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.inner.state.read().clone()
    }

    /// Borrow the current state. Do not dispatch from inside `f`.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.read())
    }

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription<S> {
        let id = self.inner.subscribers.add(Arc::new(callback));
        Subscription {
            id,
            store: self.clone(),
        }
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Tell every subscriber the state was replaced.
    pub fn notify(&self) {
        self.inner.subscribers.notify();
    }

    /// Effects spawned by this store that have not yet been redispatched.
    pub fn in_flight(&self) -> usize {
        self.inner.inflight.count()
    }

    /// Wait until every spawned effect, and every effect those redispatches spawned,
    /// has settled and been redispatched.
    pub async fn settled(&self) {
        self.inner.inflight.wait_idle().await;
    }

    /// Errors raised while redispatching settled effects. Draining clears them.
    pub fn take_unhandled(&self) -> Vec<StoreError> {
        std::mem::take(&mut *self.inner.unhandled.lock())
    }

    /// Resolve `event` against the actions, then the mutations, and apply the result.
    ///
    /// State is replaced and subscribers notified before this returns. Effects are
    /// spawned on the current tokio runtime and redispatch under their labels once
    /// they settle.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotAnAction`] when neither table has a handler for `event`;
    /// [`StoreError::NoRuntime`] when the response carries effects and no tokio
    /// runtime is running. In both cases state is left untouched.
    pub fn dispatch(&self, event: &str, payload: Value) -> Result<()> {
        let name = &self.inner.config.name;
        let mut state = self.inner.state.write();

        let response = if let Some(action) = self.inner.actions.lookup(event) {
            debug!(store = %name, event, "dispatching action");
            action(&*state, &payload)
        } else if let Some(mutation) = self.inner.mutations.lookup(event) {
            debug!(store = %name, event, "dispatching mutation");
            Response::state(mutation(&*state, &payload))
        } else {
            return Err(StoreError::NotAnAction(event.to_string()));
        };

        if response.is_none() {
            return Ok(());
        }

        let runtime = if response.has_effects() {
            Some(Handle::try_current().map_err(|_| StoreError::NoRuntime(event.to_string()))?)
        } else {
            None
        };

        let (next, effects) = response.into_parts();
        let replaced = match next {
            Some(next) => {
                *state = next;
                true
            }
            None => false,
        };
        drop(state);

        if replaced {
            self.notify();
        }

        if let Some(runtime) = runtime {
            debug!(store = %name, event, count = effects.len(), "spawning effects");
            for effect in effects {
                self.spawn_effect(&runtime, effect);
            }
        }

        Ok(())
    }

    fn spawn_effect(&self, runtime: &Handle, effect: Effect<S>) {
        let guard = self.inner.inflight.enter();
        let store = self.clone();
        runtime.spawn(async move {
            let outcome = effect.settle(&store).await;
            store.redispatch(outcome);
            drop(guard);
        });
    }

    fn redispatch(&self, outcome: Outcome) {
        let name = &self.inner.config.name;
        let settlement = if outcome.ok {
            Settlement::Success
        } else {
            Settlement::Failure
        };

        let Some(label) = outcome.label else {
            match self.inner.config.missing_label {
                MissingLabelPolicy::Ignore => {
                    debug!(store = %name, %settlement, "effect settled without a label, dropping");
                }
                MissingLabelPolicy::Report => {
                    warn!(store = %name, %settlement, "effect settled without a label");
                    self.record_unhandled(StoreError::UnroutedOutcome {
                        outcome: settlement,
                        value: outcome.content,
                    });
                }
            }
            return;
        };

        debug!(store = %name, %settlement, event = %label, "redispatching settled effect");
        if let Err(err) = self.dispatch(&label, outcome.content) {
            error!(store = %name, event = %label, error = %err, "redispatch failed");
            self.record_unhandled(err);
        }
    }

    fn record_unhandled(&self, err: StoreError) {
        self.inner.unhandled.lock().push(err);
    }
}

/// Handle returned by [`Store::subscribe`].
///
/// Dropping it keeps the subscription alive; call [`Subscription::unsubscribe`] to end it.
pub struct Subscription<S> {
    id: SubscriptionId,
    store: Store<S>,
}

impl<S: Send + Sync + 'static> Subscription<S> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) -> bool {
        self.store.unsubscribe(self.id)
    }
}
