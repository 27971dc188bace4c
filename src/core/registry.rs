use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

/// The one registry a server owns, shared by every connection task.
///
/// Every command runs with the lock held for its whole duration, so a
/// check-then-create can't interleave with another connection and a dump
/// never observes a half-applied change.
pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Whether a `make_*` call added a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Created,
    Existing,
}

/// Association of an exchange, a topic key and a queue.
///
/// Nothing populates or consults these yet; exchanges always carry an empty
/// list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub topic_key: String,
    pub queue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    name: String,
    bindings: Vec<Binding>,
}

impl Exchange {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Queue {
    name: String,
}

impl Queue {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Queue: {}>", self.name)
    }
}

/// Named exchanges and queues. The two maps are separate namespaces; names are
/// case-sensitive and entries are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    exchanges: BTreeMap<String, Exchange>,
    queues: BTreeMap<String, Queue>,
}

/// Borrowed view used for the DUMP document:
/// `{"exchanges":[{"name":..,"bindings":[..]}],"queues":[{"name":..}]}`.
#[derive(Serialize)]
struct Snapshot<'a> {
    exchanges: Vec<&'a Exchange>,
    queues: Vec<&'a Queue>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Creates exchange `name` unless it already exists.
    pub fn make_exchange(&mut self, name: &str) -> Creation {
        if self.exchanges.contains_key(name) {
            return Creation::Existing;
        }
        debug!("creating exchange '{}'", name);
        self.exchanges.insert(name.to_string(), Exchange::new(name));
        Creation::Created
    }

    /// Creates queue `name` unless it already exists.
    pub fn make_queue(&mut self, name: &str) -> Creation {
        if self.queues.contains_key(name) {
            return Creation::Existing;
        }
        debug!("creating queue '{}'", name);
        self.queues.insert(name.to_string(), Queue::new(name));
        Creation::Created
    }

    pub fn exchange(&self, name: &str) -> Option<&Exchange> {
        self.exchanges.get(name)
    }

    pub fn queue(&self, name: &str) -> Option<&Queue> {
        self.queues.get(name)
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Serializes the whole registry. Entries come out sorted by name.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot = Snapshot {
            exchanges: self.exchanges.values().collect(),
            queues: self.queues.values().collect(),
        };
        serde_json::to_string(&snapshot)
    }
}
