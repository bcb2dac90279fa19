//! # Todo Demo
//!
//! A todo list driven entirely through `dispatch`. A subscriber stands in for
//! a view layer and re-renders on every update notification.
//!
//! - `todos.add` updates state and schedules a simulated save
//! - `todos.load` fans out to two simulated sources with `Effect::all`
//! - blank todos make the save reject, routing to `todos.save_failed`

use std::time::Duration;

use anyhow::Result;
use tandem_core::{json, Actions, Effect, Labels, Mutations, Response, Store, StoreConfig, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Todos {
    items: Vec<String>,
    saved: usize,
    errors: Vec<String>,
}

impl Todos {
    fn render(&self) -> String {
        format!(
            "{} todos ({} saved): [{}]{}",
            self.items.len(),
            self.saved,
            self.items.join(", "),
            if self.errors.is_empty() {
                String::new()
            } else {
                format!(" errors: {}", self.errors.join("; "))
            }
        )
    }
}

// ============================================================================
// Effects
// ============================================================================

fn simulated_save(todo: String) -> Effect<Todos> {
    Effect::new(Labels::new("todos.saved", "todos.save_failed"), move |_| {
        let todo = todo.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if todo.trim().is_empty() {
                Err(json!("refusing to save a blank todo"))
            } else {
                Ok(json!(todo))
            }
        }
    })
}

fn simulated_source(items: &'static [&'static str], delay_ms: u64) -> Effect<Todos> {
    Effect::new(Labels::none(), move |_| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(json!(items))
    })
}

// ============================================================================
// Tables
// ============================================================================

fn mutations() -> Mutations<Todos> {
    Mutations::new().namespace(
        "todos",
        Mutations::new()
            .mutation("saved", |todos: &Todos, _| Todos {
                saved: todos.saved + 1,
                ..todos.clone()
            })
            .mutation("save_failed", |todos: &Todos, error| {
                let mut errors = todos.errors.clone();
                errors.push(error.as_str().unwrap_or("save failed").to_string());
                Todos {
                    errors,
                    ..todos.clone()
                }
            })
            .mutation("loaded", |todos: &Todos, sources| {
                let mut items = todos.items.clone();
                for source in sources.as_array().into_iter().flatten() {
                    for item in source.as_array().into_iter().flatten() {
                        items.extend(item.as_str().map(str::to_string));
                    }
                }
                Todos {
                    items,
                    ..todos.clone()
                }
            }),
    )
}

fn actions() -> Actions<Todos> {
    Actions::new().namespace(
        "todos",
        Actions::new()
            .action("add", |todos: &Todos, todo| {
                let todo = todo.as_str().unwrap_or_default().to_string();
                let mut items = todos.items.clone();
                items.push(todo.clone());
                Response::state(Todos {
                    items,
                    ..todos.clone()
                })
                .with_effect(simulated_save(todo))
            })
            .action("load", |_: &Todos, _| {
                let sources = vec![
                    simulated_source(&["walk the dog", "water plants"], 40),
                    simulated_source(&["call mum"], 10),
                ];
                Response::effect(Effect::all(
                    Labels::new("todos.loaded", "todos.save_failed"),
                    sources,
                ))
            }),
    )
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = Store::builder(Todos::default())
        .mutations(mutations())
        .actions(actions())
        .config(StoreConfig::named("todos"))
        .build();

    let view = store.clone();
    let subscription = store.subscribe(move || println!("{}", view.read(Todos::render)));

    store.dispatch("todos.add", json!("buy milk"))?;
    store.dispatch("todos.add", json!("  "))?;
    store.dispatch("todos.load", Value::Null)?;

    if let Err(err) = store.dispatch("todos.remove", json!(0)) {
        warn!(error = %err, "unknown event rejected");
    }

    store.settled().await;
    subscription.unsubscribe();
    for error in store.take_unhandled() {
        warn!(%error, "unhandled redispatch");
    }
    info!(in_flight = store.in_flight(), "store settled");

    println!("final: {}", store.read(Todos::render));
    Ok(())
}
