//! # HTTP Fetcher Demo
//!
//! Fetches a few URLs through `tandem-http` effects. Each response is routed
//! back into the store as `fetch.done` or `fetch.failed`.
//!
//! Set `TANDEM_CONFIG` to a JSON `StoreConfig` to override the store name or
//! the missing-label policy, and `RUST_LOG=debug` to watch the dispatch loop.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tandem_core::{json, Actions, Effect, Labels, Mutations, Response, Store, StoreConfig, Value};
use tandem_http::{Http, Request};
use tracing_subscriber::EnvFilter;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Fetch {
    Pending,
    Fetched { bytes: usize },
    Failed { reason: Value },
}

#[derive(Debug, Clone, Default)]
struct Fetches {
    by_url: BTreeMap<String, Fetch>,
}

impl Fetches {
    fn with(&self, url: &str, fetch: Fetch) -> Self {
        let mut by_url = self.by_url.clone();
        by_url.insert(url.to_string(), fetch);
        Self { by_url }
    }
}

// ============================================================================
// Effects
// ============================================================================

/// Fetch `url`, tagging both outcomes with the url so the mutations know which entry to update.
fn fetch(http: Http, url: String) -> Effect<Fetches> {
    Effect::new(Labels::new("fetch.done", "fetch.failed"), move |_| {
        let http = http.clone();
        let url = url.clone();
        async move {
            match http.send(&Request::get(url.as_str())).await {
                Ok(body) => Ok(json!({ "url": url, "bytes": body.as_str().map_or(0, str::len) })),
                Err(reason) => Err(json!({ "url": url, "reason": reason })),
            }
        }
    })
}

// ============================================================================
// Tables
// ============================================================================

fn url_of(payload: &Value) -> &str {
    payload["url"].as_str().unwrap_or_default()
}

fn mutations() -> Mutations<Fetches> {
    Mutations::new().namespace(
        "fetch",
        Mutations::new()
            .mutation("done", |fetches: &Fetches, payload| {
                let bytes = payload["bytes"].as_u64().unwrap_or_default() as usize;
                fetches.with(url_of(payload), Fetch::Fetched { bytes })
            })
            .mutation("failed", |fetches: &Fetches, payload| {
                let reason = payload["reason"].clone();
                fetches.with(url_of(payload), Fetch::Failed { reason })
            }),
    )
}

fn actions(http: Http) -> Actions<Fetches> {
    Actions::new().namespace(
        "fetch",
        Actions::new().action("requested", move |fetches: &Fetches, payload| {
            let Some(url) = payload.as_str() else {
                return Response::none();
            };
            Response::state(fetches.with(url, Fetch::Pending))
                .with_effect(fetch(http.clone(), url.to_string()))
        }),
    )
}

fn config() -> Result<StoreConfig> {
    match env::var("TANDEM_CONFIG") {
        Ok(raw) => serde_json::from_str(&raw).context("TANDEM_CONFIG is not a valid store config"),
        Err(_) => Ok(StoreConfig::named("http-fetcher")),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let http = Http::new(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?,
    );

    let store = Store::builder(Fetches::default())
        .mutations(mutations())
        .actions(actions(http))
        .config(config()?)
        .build();

    let urls = [
        "https://example.com",
        "https://httpbin.org/status/200",
        "https://httpbin.org/status/404",
    ];

    for url in urls {
        println!("Fetching: {}", url);
        store.dispatch("fetch.requested", json!(url))?;
    }

    store.settled().await;

    for (url, fetch) in store.state().by_url {
        println!("{url}: {fetch:?}");
    }
    for error in store.take_unhandled() {
        eprintln!("unhandled: {error}");
    }

    Ok(())
}
