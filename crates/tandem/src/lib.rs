//! # Tandem
//!
//! A minimal state container where state changes are plain data transformations
//! and side effects are first-class, composable, deferred values.
//!
//! ## Core Concepts
//!
//! - [`Store`] = Owns the state. `dispatch` is the only writer.
//! - Mutation = `(state, payload) -> state`, pure.
//! - Action = `(state, payload) -> Response`, a new state plus effects to run.
//! - [`Effect`] = Deferred async work tagged with the event names to dispatch
//!   when it succeeds or fails.
//!
//! ## Architecture
//!
//! ```text
//! caller
//!   │
//!   ▼ dispatch("todos.add", payload)
//! Store ──► actions / mutations (dotted lookup)
//!   │
//!   ├─► state replaced ─► subscribers notified
//!   │
//!   └─► effects spawned ──┐
//!                         ▼
//!                  Effect.resolve(store)
//!                         │
//!         ┌───── ok ──────┴───── err ─────┐
//!         ▼                               ▼
//!  dispatch(success, value)      dispatch(failure, error)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **State changes only in `dispatch`** - and always before any effect of that dispatch starts
//! 2. **Effects are values** - `map`/`then` never mutate the receiver
//! 3. **Bind hands off the rest of the chain** - steps after a `then` run on the effect it returns
//! 4. **`all` is fan-out** - members resolve concurrently; the first failure *in input order* wins
//! 5. **No rejection is swallowed** - effect failures (panics included) redispatch under their
//!    failure label, and failed redispatches are kept in [`Store::take_unhandled`]
//!
//! ## Example
//!
//! ```ignore
//! use tandem_core::{json, Actions, Effect, Labels, Mutations, Response, Store, Value};
//!
//! #[derive(Clone, Default)]
//! struct App { todos: Vec<String>, saved: bool }
//!
//! let mutations = Mutations::new()
//!     .mutation("saved", |app: &App, _| App { saved: true, ..app.clone() });
//!
//! let actions = Actions::new().namespace(
//!     "todos",
//!     Actions::new().action("add", |app: &App, todo| {
//!         let mut todos = app.todos.clone();
//!         todos.push(todo.as_str().unwrap_or_default().to_string());
//!
//!         let save = Effect::new(Labels::new("saved", "save_failed"), |_store| async {
//!             Ok(Value::Null)
//!         });
//!         Response::state(App { todos, ..app.clone() }).with_effect(save)
//!     }),
//! );
//!
//! let store = Store::new(App::default(), mutations, actions);
//! store.dispatch("todos.add", json!("buy milk"))?;
//! store.settled().await;
//! ```
//!
//! ## What This Is Not
//!
//! Tandem does not persist state, dispatch across processes, cancel effects,
//! or throttle them.

mod config;
mod effect;
mod error;
mod inflight;
mod response;
mod store;
mod subscribe;
mod table;


// Re-export effect types
pub use effect::{Effect, EffectProducer, Label, Labels, Outcome};

// Re-export store types
pub use response::Response;
pub use store::{Store, StoreBuilder, Subscription};
pub use subscribe::SubscriptionId;

// Re-export handler tables
pub use table::{Action, Actions, Mutation, Mutations, Node, Resolution, Table};

// Re-export configuration
pub use config::{MissingLabelPolicy, StoreConfig};

// Re-export error types
pub use error::{Result, Settlement, StoreError};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use serde_json::{json, Value};
