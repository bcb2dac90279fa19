//! Deferred, composable effects.
//!
//! An [`Effect`] describes asynchronous work without running it. It carries
//! optional success and failure labels: once the store has resolved the effect,
//! the settled value is dispatched again under the matching label.
//!
//! Effects are immutable. [`Effect::map`] and [`Effect::then`] return a new
//! effect sharing the same `run` and labels with one more step appended to its
//! chain, so an effect can be reused and extended from several places.
//!
//! ```ignore
//! let fetch = Effect::new(Labels::new("loaded", "failed"), |_store| async {
//!     Ok(json!(2))
//! });
//!
//! let doubled = fetch
//!     .map(|n| json!(n.as_i64().unwrap_or(0) * 2))
//!     .then(|n| Effect::resolved(json!({ "count": n })));
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use tracing::{trace, warn};

use crate::store::Store;

/// An event name dispatched when an effect settles.
pub type Label = String;

type Run<S> = Arc<dyn Fn(Store<S>) -> BoxFuture<'static, Result<Value, Value>> + Send + Sync>;
type Mapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;
type Binder<S> = Arc<dyn Fn(Value) -> Effect<S> + Send + Sync>;

/// Success and failure routing for an effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    pub success: Option<Label>,
    pub failure: Option<Label>,
}

impl Labels {
    pub fn new(success: impl Into<Label>, failure: impl Into<Label>) -> Self {
        Self {
            success: Some(success.into()),
            failure: Some(failure.into()),
        }
    }

    /// No routing at all. The settled value is only visible to whoever resolves the effect.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn success(label: impl Into<Label>) -> Self {
        Self {
            success: Some(label.into()),
            failure: None,
        }
    }

    pub fn failure(label: impl Into<Label>) -> Self {
        Self {
            success: None,
            failure: Some(label.into()),
        }
    }
}

/// Something that can do the actual asynchronous work behind an effect.
///
/// Closures work through [`Effect::new`]; implement this for reusable
/// producers that carry their own configuration (an HTTP request, a timer).
#[async_trait]
pub trait EffectProducer<S: Send + Sync + 'static>: Send + Sync {
    async fn produce(&self, store: Store<S>) -> Result<Value, Value>;
}

enum Step<S> {
    Map(Mapper),
    Bind(Binder<S>),
}

impl<S> Clone for Step<S> {
    fn clone(&self) -> Self {
        match self {
            Step::Map(f) => Step::Map(Arc::clone(f)),
            Step::Bind(f) => Step::Bind(Arc::clone(f)),
        }
    }
}

/// The settled result of one effect, tagged with the label its side selects.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub ok: bool,
    pub label: Option<Label>,
    pub content: Value,
}

/// A deferred computation against a [`Store`], plus the labels to dispatch on settlement.
pub struct Effect<S> {
    labels: Labels,
    run: Run<S>,
    chain: Vec<Step<S>>,
}

impl<S> Clone for Effect<S> {
    fn clone(&self) -> Self {
        Self {
            labels: self.labels.clone(),
            run: Arc::clone(&self.run),
            chain: self.chain.clone(),
        }
    }
}

impl<S> fmt::Debug for Effect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("labels", &self.labels)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

impl<S: Send + Sync + 'static> Effect<S> {
    /// Wrap an asynchronous function of the store.
    ///
    /// `run` is called once per resolution; it is never called at construction.
    pub fn new<F, Fut>(labels: Labels, run: F) -> Self
    where
        F: Fn(Store<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Self {
            labels,
            run: Arc::new(move |store: Store<S>| run(store).boxed()),
            chain: Vec::new(),
        }
    }

    pub fn from_producer<P>(labels: Labels, producer: P) -> Self
    where
        P: EffectProducer<S> + 'static,
    {
        let producer = Arc::new(producer);
        Self::new(labels, move |store| {
            let producer = Arc::clone(&producer);
            async move { producer.produce(store).await }
        })
    }

    /// An effect that resolves immediately with `value` and is routed to `label`.
    pub fn success(label: impl Into<Label>, value: Value) -> Self {
        Self::new(Labels::success(label), move |_| future::ready(Ok(value.clone())))
    }

    /// An effect that rejects immediately with `value` and is routed to `label`.
    pub fn fail(label: impl Into<Label>, value: Value) -> Self {
        Self::new(Labels::failure(label), move |_| future::ready(Err(value.clone())))
    }

    /// Unlabeled immediate success, mostly useful as the result of a bind.
    pub fn resolved(value: Value) -> Self {
        Self::new(Labels::none(), move |_| future::ready(Ok(value.clone())))
    }

    /// Unlabeled immediate rejection.
    pub fn rejected(value: Value) -> Self {
        Self::new(Labels::none(), move |_| future::ready(Err(value.clone())))
    }

    /// Resolve every effect concurrently, then reduce the outcomes in input order.
    ///
    /// Resolves with the array of success values, or rejects with the content of the
    /// first failure *in input order*, regardless of which member failed first in time.
    /// A failing member never cancels its siblings.
    pub fn all(labels: Labels, effects: Vec<Effect<S>>) -> Self {
        let effects = Arc::new(effects);
        Self::new(labels, move |store| {
            let effects = Arc::clone(&effects);
            async move {
                let outcomes = settle_all(&store, &effects).await;
                let mut contents = Vec::with_capacity(outcomes.len());
                for outcome in outcomes {
                    if !outcome.ok {
                        return Err(outcome.content);
                    }
                    contents.push(outcome.content);
                }
                Ok(Value::Array(contents))
            }
        })
    }

    /// Like [`Effect::all`], but keeps every outcome instead of stopping at the first failure.
    ///
    /// Resolves with an object keyed by each member's success label, or rejects with an
    /// object holding every failure keyed by its failure label. Members without the
    /// relevant label are keyed by their input index. A repeated label keeps the later member.
    pub fn all_keyed(labels: Labels, effects: Vec<Effect<S>>) -> Self {
        let effects = Arc::new(effects);
        Self::new(labels, move |store| {
            let effects = Arc::clone(&effects);
            async move {
                let outcomes = settle_all(&store, &effects).await;
                let mut successes = Map::new();
                let mut failures = Map::new();
                for (index, outcome) in outcomes.into_iter().enumerate() {
                    let key = outcome.label.unwrap_or_else(|| index.to_string());
                    if outcome.ok {
                        successes.insert(key, outcome.content);
                    } else {
                        failures.insert(key, outcome.content);
                    }
                }
                if failures.is_empty() {
                    Ok(Value::Object(successes))
                } else {
                    Err(Value::Object(failures))
                }
            }
        })
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn success_label(&self) -> Option<&str> {
        self.labels.success.as_deref()
    }

    pub fn failure_label(&self) -> Option<&str> {
        self.labels.failure.as_deref()
    }

    /// Append a synchronous transform of the resolved value.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.append(Step::Map(Arc::new(f)))
    }

    /// Append a bind: `f` receives the value reduced so far and returns the effect
    /// that carries the rest of the chain.
    pub fn then<F>(&self, f: F) -> Self
    where
        F: Fn(Value) -> Effect<S> + Send + Sync + 'static,
    {
        self.append(Step::Bind(Arc::new(f)))
    }

    /// Append a fallible transform. `Err` rejects the whole resolution.
    pub fn try_map<F>(&self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.then(move |value| match f(value) {
            Ok(value) => Effect::resolved(value),
            Err(error) => Effect::rejected(error),
        })
    }

    fn append(&self, step: Step<S>) -> Self {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.extend(self.chain.iter().cloned());
        chain.push(step);
        Self {
            labels: self.labels.clone(),
            run: Arc::clone(&self.run),
            chain,
        }
    }

    /// Run the effect and apply its chain.
    ///
    /// Map steps apply in order. The first bind hands the remaining steps to the
    /// effect it returns and resolves that instead. A panic anywhere along the
    /// way rejects with `{ "panic": message }` instead of unwinding the caller.
    pub fn resolve(&self, store: &Store<S>) -> BoxFuture<'static, Result<Value, Value>> {
        let run = Arc::clone(&self.run);
        let chain = self.chain.clone();
        let store = store.clone();
        let resolution = async move {
            let mut value = run(store.clone()).await?;
            for (index, step) in chain.iter().enumerate() {
                match step {
                    Step::Map(f) => value = f(value),
                    Step::Bind(f) => {
                        let mut next = f(value);
                        let rest = &chain[index + 1..];
                        trace!(remaining = rest.len(), "effect bound");
                        next.chain.extend(rest.iter().cloned());
                        return next.resolve(&store).await;
                    }
                }
            }
            Ok(value)
        };
        AssertUnwindSafe(resolution)
            .catch_unwind()
            .map(|caught| caught.unwrap_or_else(|panic| Err(panic_rejection(panic))))
            .boxed()
    }

    /// Resolve and tag the result with the label of the side that settled.
    pub async fn settle(&self, store: &Store<S>) -> Outcome {
        match self.resolve(store).await {
            Ok(content) => Outcome {
                ok: true,
                label: self.labels.success.clone(),
                content,
            },
            Err(content) => Outcome {
                ok: false,
                label: self.labels.failure.clone(),
                content,
            },
        }
    }
}

async fn settle_all<S: Send + Sync + 'static>(
    store: &Store<S>,
    effects: &[Effect<S>],
) -> Vec<Outcome> {
    future::join_all(effects.iter().map(|effect| effect.settle(store))).await
}

/// A panic in `run` or in a chained closure rejects the resolution with
/// `{ "panic": message }`.
fn panic_rejection(panic: Box<dyn Any + Send>) -> Value {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "effect panicked".to_string());
    warn!(%message, "effect panicked, rejecting");
    json!({ "panic": message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn store() -> Store<()> {
        Store::builder(()).build()
    }

    fn options() -> Labels {
        Labels::new("success", "failure")
    }

    fn delayed(labels: Labels, ms: u64, result: Result<Value, Value>) -> Effect<()> {
        Effect::new(labels, move |_| {
            let result = result.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                result
            }
        })
    }

    fn add(n: i64) -> impl Fn(Value) -> Value + Send + Sync + 'static {
        move |v| json!(v.as_i64().unwrap() + n)
    }

    fn mul(n: i64) -> impl Fn(Value) -> Value + Send + Sync + 'static {
        move |v| json!(v.as_i64().unwrap() * n)
    }

    #[tokio::test]
    async fn test_resolves_run_value() {
        let effect = Effect::new(options(), |_| async { Ok(json!("test")) });
        assert_eq!(effect.resolve(&store()).await, Ok(json!("test")));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_from_resolve() {
        let effect = Effect::new(options(), |_| async { Err(json!("test")) });
        assert_eq!(effect.resolve(&store()).await, Err(json!("test")));
    }

    #[tokio::test]
    async fn test_map_is_lazy_and_applies_on_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let effect = Effect::new(options(), |_| async { Ok(json!("test")) }).map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            json!(format!("{}test", v.as_str().unwrap()))
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(effect.resolve(&store()).await, Ok(json!("testtest")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_map_composition_matches_composed_map() {
        let store = store();
        let base = Effect::<()>::success("done", json!(3));

        let stepwise = base.map(add(1)).map(mul(10));
        let composed = base.map(|v| mul(10)(add(1)(v)));

        assert_eq!(stepwise.resolve(&store).await, composed.resolve(&store).await);
        assert_eq!(stepwise.resolve(&store).await, Ok(json!(40)));
    }

    #[tokio::test]
    async fn test_then_chains_into_new_effect() {
        let effect = Effect::new(options(), |_| async { Ok(json!(2)) })
            .then(|v| Effect::new(options(), move |_| future::ready(Ok(add(2)(v.clone())))));
        assert_eq!(effect.resolve(&store()).await, Ok(json!(4)));
    }

    #[tokio::test]
    async fn test_bind_is_associative() {
        let store = store();
        let f = |v: Value| Effect::<()>::resolved(add(5)(v));
        let g = |v: Value| Effect::<()>::resolved(mul(3)(v));
        let base = Effect::<()>::success("done", json!(1));

        let left = base.then(f).then(g);
        let right = base.then(move |v| f(v).then(g));

        assert_eq!(left.resolve(&store).await, right.resolve(&store).await);
        assert_eq!(left.resolve(&store).await, Ok(json!(18)));
    }

    #[tokio::test]
    async fn test_mixed_chain_leaves_receiver_untouched() {
        let store = store();
        let effect = Effect::new(options(), |_| async { Ok(json!(2)) });
        let extended = effect
            .then(|v| Effect::resolved(add(2)(v)))
            .map(mul(1000))
            .then(|v| Effect::new(Labels::none(), move |_| future::ready(Ok(add(2)(v.clone())))));

        assert_eq!(extended.resolve(&store).await, Ok(json!(4002)));
        assert_eq!(effect.resolve(&store).await, Ok(json!(2)));
        assert_eq!(extended.labels(), effect.labels());
    }

    #[tokio::test]
    async fn test_rejection_inside_bound_effect_propagates() {
        let effect = Effect::<()>::new(options(), |_| async { Ok(json!(2)) })
            .then(|v| Effect::resolved(add(2)(v)))
            .map(mul(1000))
            .then(|v| Effect::rejected(add(2)(v)))
            .map(|_| json!("unreachable"));

        assert_eq!(effect.resolve(&store()).await, Err(json!(4002)));
    }

    #[tokio::test]
    async fn test_try_map_error_rejects() {
        let effect = Effect::<()>::success("ok", json!("nope"))
            .try_map(|v| v.as_i64().map(|n| json!(n)).ok_or(json!({ "bad": v })));
        assert_eq!(effect.resolve(&store()).await, Err(json!({ "bad": "nope" })));
    }

    #[tokio::test]
    async fn test_panicking_mapper_rejects() {
        let effect = Effect::<()>::success("ok", json!("x")).map(|v| json!(v.as_i64().unwrap()));
        let rejection = effect.resolve(&store()).await.unwrap_err();
        assert!(rejection["panic"].as_str().unwrap().contains("unwrap"));
    }

    #[tokio::test]
    async fn test_panicking_run_and_binder_reject_with_message() {
        let store = store();

        let run = Effect::<()>::new(options(), |_| async {
            let empty: Vec<i64> = Vec::new();
            Ok(json!(empty[0]))
        });
        let rejection = run.resolve(&store).await.unwrap_err();
        assert!(rejection["panic"].as_str().unwrap().starts_with("index out of bounds"));

        let bound = Effect::<()>::resolved(json!(1))
            .then(|_| panic!("binder"))
            .map(add(1));
        assert_eq!(bound.resolve(&store).await, Err(json!({ "panic": "binder" })));
    }

    #[tokio::test]
    async fn test_panicking_member_fails_all_without_cancelling_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let slow = Effect::<()>::new(Labels::none(), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("slow"))
            }
        });
        let boom = Effect::<()>::resolved(json!(0)).map(|_| panic!("member"));

        let all = Effect::all(options(), vec![slow, boom]);
        assert_eq!(all.resolve(&store()).await, Err(json!({ "panic": "member" })));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_and_fail_are_labeled() {
        let store = store();
        let ok = Effect::<()>::success("success", json!(4));
        let err = Effect::<()>::fail("failure", json!(4));

        assert_eq!(ok.resolve(&store).await, Ok(json!(4)));
        assert_eq!(ok.success_label(), Some("success"));
        assert_eq!(ok.failure_label(), None);

        assert_eq!(err.resolve(&store).await, Err(json!(4)));
        assert_eq!(err.failure_label(), Some("failure"));
        assert_eq!(err.success_label(), None);
    }

    #[tokio::test]
    async fn test_all_resolves_in_input_order() {
        let effects = vec![
            delayed(options(), 30, Ok(json!(4))),
            delayed(options(), 0, Ok(json!(5))),
            delayed(options(), 15, Ok(json!(6))),
        ];
        let combined = Effect::all(options(), effects);
        assert_eq!(combined.resolve(&store()).await, Ok(json!([4, 5, 6])));
    }

    #[tokio::test]
    async fn test_all_rejects_with_first_failure_in_input_order() {
        let effects = vec![
            Effect::success("success", json!(4)),
            delayed(options(), 40, Err(json!(5))),
            delayed(options(), 0, Err(json!(6))),
        ];
        let combined = Effect::all(options(), effects);
        assert_eq!(combined.resolve(&store()).await, Err(json!(5)));
    }

    #[tokio::test]
    async fn test_all_runs_members_concurrently() {
        let started = tokio::time::Instant::now();
        let effects = (0..4)
            .map(|n| delayed(options(), 50, Ok(json!(n))))
            .collect::<Vec<_>>();
        let combined = Effect::all(options(), effects);

        assert_eq!(combined.resolve(&store()).await, Ok(json!([0, 1, 2, 3])));
        assert!(started.elapsed() < Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_all_failure_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let slow = Effect::new(options(), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!("slow"))
            }
        });
        let combined = Effect::all(options(), vec![Effect::fail("failure", json!(1)), slow]);

        assert_eq!(combined.resolve(&store()).await, Err(json!(1)));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_of_nothing_is_empty_array() {
        let combined = Effect::<()>::all(options(), Vec::new());
        assert_eq!(combined.resolve(&store()).await, Ok(json!([])));
    }

    #[tokio::test]
    async fn test_all_keyed_collects_by_label() {
        let store = store();
        let ok = Effect::<()>::all_keyed(
            options(),
            vec![
                Effect::success("users", json!(["ann"])),
                Effect::success("posts", json!([])),
                Effect::resolved(json!("anon")),
            ],
        );
        assert_eq!(
            ok.resolve(&store).await,
            Ok(json!({ "users": ["ann"], "posts": [], "2": "anon" }))
        );

        let failed = Effect::<()>::all_keyed(
            options(),
            vec![
                Effect::fail("users", json!("timeout")),
                Effect::success("posts", json!([])),
                Effect::fail("tags", json!(500)),
            ],
        );
        assert_eq!(
            failed.resolve(&store).await,
            Err(json!({ "users": "timeout", "tags": 500 }))
        );
    }

    #[tokio::test]
    async fn test_settle_tags_outcome_with_matching_label() {
        let store = store();
        let ok = Effect::<()>::new(options(), |_| async { Ok(json!(1)) }).settle(&store).await;
        let err = Effect::<()>::new(options(), |_| async { Err(json!(2)) }).settle(&store).await;

        assert_eq!(
            ok,
            Outcome { ok: true, label: Some("success".into()), content: json!(1) }
        );
        assert_eq!(
            err,
            Outcome { ok: false, label: Some("failure".into()), content: json!(2) }
        );
    }

    struct Constant(Value);

    #[async_trait]
    impl EffectProducer<()> for Constant {
        async fn produce(&self, _store: Store<()>) -> Result<Value, Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_producer_backed_effect() {
        let effect = Effect::from_producer(options(), Constant(json!({ "n": 1 })));
        assert_eq!(effect.resolve(&store()).await, Ok(json!({ "n": 1 })));
    }
}
