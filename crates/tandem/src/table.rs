//! Namespaced handler tables.
//!
//! Mutations and actions are stored in trees keyed by name. An event name such
//! as `"todos.items.add"` is split on `.` and resolved by walking one branch per
//! segment until a leaf handler is reached on the last segment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::response::Response;

/// A pure `(state, payload) -> state` function.
pub type Mutation<S> = Arc<dyn Fn(&S, &Value) -> S + Send + Sync>;

/// A `(state, payload) -> response` function. The response may carry a new
/// state and any number of effects.
pub type Action<S> = Arc<dyn Fn(&S, &Value) -> Response<S> + Send + Sync>;

pub type Mutations<S> = Table<Mutation<S>>;
pub type Actions<S> = Table<Action<S>>;

/// One entry of a [`Table`].
pub enum Node<F> {
    Leaf(F),
    Branch(Table<F>),
}

/// The result of looking up a dotted path.
#[derive(Debug)]
pub enum Resolution<'a, F> {
    /// The path ends on a handler.
    Found(&'a F),
    /// The path ends on a nested table rather than a handler.
    Namespace,
    /// Some segment is absent, the path runs past a handler, or the path is empty.
    Missing,
}

impl<'a, F> Resolution<'a, F> {
    pub fn found(self) -> Option<&'a F> {
        match self {
            Resolution::Found(handler) => Some(handler),
            Resolution::Namespace | Resolution::Missing => None,
        }
    }
}

/// A string-keyed tree of handlers.
pub struct Table<F> {
    entries: HashMap<String, Node<F>>,
}

impl<F> Default for Table<F> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<F> fmt::Debug for Table<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Table").field("entries", &names).finish()
    }
}

impl<F> Table<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, name: impl Into<String>, node: Node<F>) -> Self {
        self.entries.insert(name.into(), node);
        self
    }

    /// Nest `table` under `name`, so its entries resolve as `name.<entry>`.
    pub fn namespace(self, name: impl Into<String>, table: Table<F>) -> Self {
        self.insert(name, Node::Branch(table))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Node<F>> {
        self.entries.get(name)
    }

    /// Resolve a dotted event name.
    pub fn resolve(&self, path: &str) -> Resolution<'_, F> {
        let segments: Vec<&str> = path.split('.').collect();
        self.resolve_segments(&segments)
    }

    pub fn lookup(&self, path: &str) -> Option<&F> {
        self.resolve(path).found()
    }

    fn resolve_segments(&self, segments: &[&str]) -> Resolution<'_, F> {
        let Some((head, tail)) = segments.split_first() else {
            return Resolution::Missing;
        };
        match (self.entries.get(*head), tail.is_empty()) {
            (None, _) => Resolution::Missing,
            (Some(Node::Leaf(handler)), true) => Resolution::Found(handler),
            (Some(Node::Leaf(_)), false) => Resolution::Missing,
            (Some(Node::Branch(_)), true) => Resolution::Namespace,
            (Some(Node::Branch(table)), false) => table.resolve_segments(tail),
        }
    }
}

impl<S> Table<Mutation<S>> {
    pub fn mutation<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S, &Value) -> S + Send + Sync + 'static,
    {
        self.insert(name, Node::Leaf(Arc::new(f)))
    }
}

impl<S> Table<Action<S>> {
    pub fn action<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S, &Value) -> Response<S> + Send + Sync + 'static,
    {
        self.insert(name, Node::Leaf(Arc::new(f)))
    }
}
