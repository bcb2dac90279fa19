//! Full dispatch cycles through a todo store.

use std::time::Duration;

use tandem_core::{json, Actions, Effect, Labels, Mutations, Response, Store, Value};
use tandem_testing::{settle_within, NotificationRecorder};

#[derive(Debug, Clone, Default, PartialEq)]
struct App {
    todos: Vec<String>,
    loading: bool,
    remote: Option<Value>,
    error: Option<Value>,
}

fn add_todo(app: &App, todo: &Value) -> App {
    let mut todos = app.todos.clone();
    todos.push(todo.as_str().unwrap_or_default().to_string());
    App {
        todos,
        ..app.clone()
    }
}

fn remote(outcome: Result<Value, Value>) -> Effect<App> {
    Effect::new(Labels::new("remote.loaded", "remote.failed"), move |_| {
        let outcome = outcome.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            outcome
        }
    })
}

fn store() -> Store<App> {
    let mutations = Mutations::new()
        .mutation("onError", |app: &App, error| App {
            error: Some(error.clone()),
            ..app.clone()
        })
        .namespace(
            "remote",
            Mutations::new()
                .mutation("loaded", |app: &App, body| App {
                    loading: false,
                    remote: Some(body.clone()),
                    ..app.clone()
                })
                .mutation("failed", |app: &App, error| App {
                    loading: false,
                    error: Some(error.clone()),
                    ..app.clone()
                }),
        );

    let actions = Actions::new()
        .action("addTodo", |app: &App, todo| Response::state(add_todo(app, todo)))
        .action("failLater", |app: &App, _| {
            Response::state(app.clone()).with_effect(Effect::fail("onError", json!(42)))
        })
        .namespace(
            "remote",
            Actions::new()
                .action("load", |app: &App, payload| {
                    let outcome = if payload["fail"].as_bool().unwrap_or(false) {
                        Err(json!({ "status": 500 }))
                    } else {
                        Ok(json!(["a", "b"]))
                    };
                    let next = App {
                        loading: true,
                        ..app.clone()
                    };
                    Response::state(next).with_effect(remote(outcome))
                })
                .action("loadBoth", |_: &App, _| {
                    let both = Effect::all(
                        Labels::new("remote.loaded", "remote.failed"),
                        vec![remote(Ok(json!(1))), remote(Ok(json!(2)))],
                    );
                    Response::effect(both.map(|pair| json!({ "pair": pair })))
                }),
        );

    Store::new(App::default(), mutations, actions)
}

#[tokio::test]
async fn add_todo_lands_in_state() {
    let store = store();
    store.dispatch("addTodo", json!("buy milk")).unwrap();
    settle_within(&store, Duration::from_secs(1)).await.unwrap();
    assert_eq!(store.state().todos, vec!["buy milk"]);
}

#[tokio::test]
async fn failing_effect_dispatches_its_failure_label() {
    let store = store();
    store.dispatch("failLater", Value::Null).unwrap();
    settle_within(&store, Duration::from_secs(1)).await.unwrap();
    assert_eq!(store.state().error, Some(json!(42)));
}

#[tokio::test]
async fn namespaced_action_routes_success_into_namespaced_mutation() {
    let store = store();
    let recorder = NotificationRecorder::attach(&store);

    store.dispatch("remote.load", json!({})).unwrap();
    assert!(store.state().loading);
    settle_within(&store, Duration::from_secs(1)).await.unwrap();

    let snapshots = recorder.detach();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots[0].loading);
    assert!(!snapshots[1].loading);
    assert_eq!(snapshots[1].remote, Some(json!(["a", "b"])));
}

#[tokio::test]
async fn namespaced_action_routes_failure_into_namespaced_mutation() {
    let store = store();
    store.dispatch("remote.load", json!({ "fail": true })).unwrap();
    settle_within(&store, Duration::from_secs(1)).await.unwrap();

    let app = store.state();
    assert!(!app.loading);
    assert_eq!(app.error, Some(json!({ "status": 500 })));
    assert_eq!(app.remote, None);
}

#[tokio::test]
async fn combined_effect_redispatches_once_with_ordered_results() {
    let store = store();
    let recorder = NotificationRecorder::attach(&store);

    store.dispatch("remote.loadBoth", Value::Null).unwrap();
    settle_within(&store, Duration::from_secs(1)).await.unwrap();

    assert_eq!(recorder.count(), 1);
    assert_eq!(store.state().remote, Some(json!({ "pair": [1, 2] })));
}

#[tokio::test]
async fn unknown_event_fails_synchronously() {
    let store = store();
    assert!(store.dispatch("remote.unload", Value::Null).is_err());
    assert!(store.dispatch("remote", Value::Null).is_err());
    assert_eq!(store.in_flight(), 0);
}
