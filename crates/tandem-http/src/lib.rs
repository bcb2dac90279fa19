//! HTTP effects for tandem stores.
//!
//! Wraps a `reqwest` call as an [`Effect`]. The effect resolves with the
//! response body as a string and rejects with a JSON object describing what
//! went wrong:
//!
//! - transport errors: `{ "message": "..." }`
//! - non-2xx responses: `{ "status": 404, "body": "..." }`
//!
//! # Usage
//!
//! ```rust,ignore
//! use tandem_http::{http, Request};
//!
//! let actions = Actions::new().action("fetch", |state: &App, url| {
//!     let request = Request::get(url.as_str().unwrap_or_default());
//!     Response::state(state.loading()).with_effect(http(request, "fetched", "fetch_failed"))
//! });
//! ```
//!
//! [`http`] builds a new client per call. To share one connection pool across
//! every request a store makes, hold an [`Http`] in the action closure:
//!
//! ```rust,ignore
//! let client = Http::new(reqwest::Client::new());
//! let actions = Actions::new().action("fetch", move |state: &App, url| {
//!     let request = Request::get(url.as_str().unwrap_or_default());
//!     let labels = Labels::new("fetched", "fetch_failed");
//!     Response::state(state.loading()).with_effect(client.effect(request, labels))
//! });
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tandem_core::{Effect, EffectProducer, Label, Labels, Store};
use tracing::debug;

/// A request description. Deserialisable so payloads can carry it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            body: Some(body.into()),
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Effect factory sharing one `reqwest::Client`.
///
/// Cloning is cheap and every clone, and every effect built from it, reuses
/// the same connection pool.
#[derive(Debug, Clone, Default)]
pub struct Http {
    client: reqwest::Client,
}

impl Http {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn effect<S: Send + Sync + 'static>(&self, request: Request, labels: Labels) -> Effect<S> {
        Effect::from_producer(
            labels,
            HttpProducer {
                client: self.client.clone(),
                request,
            },
        )
    }

    /// Perform `request` now. This is what the effect runs.
    pub async fn send(&self, request: &Request) -> Result<Value, Value> {
        send(&self.client, request).await
    }
}

/// An effect that performs `request` with a default client and routes the
/// body to `success` or the error to `failure`.
///
/// Each call builds a fresh `reqwest::Client`, and with it a fresh connection
/// pool. Stores that issue many requests should hold one [`Http`] and call
/// [`Http::effect`] so every effect shares its pool.
pub fn http<S: Send + Sync + 'static>(
    request: Request,
    success: impl Into<Label>,
    failure: impl Into<Label>,
) -> Effect<S> {
    Http::default().effect(request, Labels::new(success, failure))
}

struct HttpProducer {
    client: reqwest::Client,
    request: Request,
}

#[async_trait]
impl<S: Send + Sync + 'static> EffectProducer<S> for HttpProducer {
    async fn produce(&self, _store: Store<S>) -> Result<Value, Value> {
        send(&self.client, &self.request).await
    }
}

async fn send(client: &reqwest::Client, request: &Request) -> Result<Value, Value> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| json!({ "message": format!("invalid method {}", request.method) }))?;

    let mut builder = client.request(method, &request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    debug!(method = %request.method, url = %request.url, "sending request");
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        Ok(Value::String(body))
    } else {
        debug!(url = %request.url, status = status.as_u16(), "request failed");
        Err(json!({ "status": status.as_u16(), "body": body }))
    }
}

fn transport_error(error: reqwest::Error) -> Value {
    json!({ "message": error.to_string() })
}
