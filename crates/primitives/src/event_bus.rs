//! The event bus: publish to a per-type fan-out stream plus synchronous
//! in-process subscriber delivery, matching §4.3 and the §9 design note on
//! SSE subscriber cleanup.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::key::Key;
use claudebench_core::value::Value;
use claudebench_core::Result;
use claudebench_storage::StoreOp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// A published event, durable in its type's stream and fanned out live to
/// any open subscription whose filter matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dotted event type, e.g. `task.completed`.
    pub event_type: String,
    /// Opaque payload.
    pub payload: HashMap<String, Value>,
    /// Assigned by the store on publish.
    pub stream_id: u64,
    /// Publish timestamp, milliseconds since epoch.
    pub timestamp: i64,
}

/// What a subscription's filter matches against a published event's type.
#[derive(Debug, Clone)]
enum Filter {
    /// Exact event type match, e.g. `task.completed`.
    Exact(String),
    /// Domain-prefix match, e.g. `task.` matches `task.completed` and
    /// `task.created` but not `instance.registered`.
    Prefix(String),
}

impl Filter {
    fn matches(&self, event_type: &str) -> bool {
        match self {
            Filter::Exact(t) => t == event_type,
            Filter::Prefix(p) => event_type.starts_with(p.as_str()),
        }
    }
}

struct SubscriberEntry {
    filter: Filter,
    sender: Sender<Event>,
}

/// A live subscription handle. Dropping it without calling [`Self::close`]
/// still works — the next publish attempt that finds the receiver
/// disconnected prunes it lazily — but an explicit close avoids carrying a
/// dead entry in the subscriber table until that next publish.
pub struct Subscription {
    id: u64,
    bus: Arc<EventBusInner>,
    receiver: Receiver<Event>,
}

impl Subscription {
    /// Block the calling thread for the next matching event.
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Non-blocking poll for the next matching event.
    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Explicitly unsubscribe, dropping this handle's entry immediately.
    pub fn close(self) {
        self.bus.subscribers.lock().remove(&self.id);
    }
}

struct EventBusInner {
    subscribers: Mutex<HashMap<u64, SubscriberEntry>>,
    next_subscriber_id: AtomicU64,
}

/// Publishes events to their durable per-type stream and fans them out to
/// live subscribers.
#[derive(Clone)]
pub struct EventBus {
    executor: AtomicExecutor,
    inner: Arc<EventBusInner>,
}

impl EventBus {
    /// Build an event bus over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self {
            executor,
            inner: Arc::new(EventBusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    /// Append `event_type`'s entry to its durable stream, then synchronously
    /// deliver it to every subscriber whose filter matches. A subscriber
    /// whose receiver has disconnected (dropped without `close`) is pruned
    /// on this pass rather than ever being delivered to again.
    pub fn publish(&self, event_type: &str, payload: HashMap<String, Value>) -> Result<Event> {
        let event_type = event_type.to_string();
        let event = self.executor.execute("EVENT_PUBLISH", {
            let event_type = event_type.clone();
            move |store, now| {
                let key = Key::stream(&event_type).as_str().to_string();
                let id = store.peek_next_stream_id(&key);
                let event = Event {
                    event_type: event_type.clone(),
                    payload: payload.clone(),
                    stream_id: id,
                    timestamp: now,
                };
                let ops = vec![StoreOp::StreamAppend {
                    key,
                    id,
                    payload: serde_json::to_value(&event)?,
                }];
                Ok((event, ops))
            }
        })?;

        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|_, entry| {
            if !entry.filter.matches(&event_type) {
                return true;
            }
            entry.sender.send(event.clone()).is_ok()
        });

        Ok(event)
    }

    fn subscribe(&self, filter: Filter) -> Subscription {
        let (sender, receiver) = channel();
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .insert(id, SubscriberEntry { filter, sender });
        Subscription {
            id,
            bus: self.inner.clone(),
            receiver,
        }
    }

    /// Subscribe to exactly one event type.
    pub fn subscribe_to(&self, event_type: impl Into<String>) -> Subscription {
        self.subscribe(Filter::Exact(event_type.into()))
    }

    /// Subscribe to every event type starting with `domain_prefix`
    /// (typically `"task."` or `"instance."`).
    pub fn subscribe_domain(&self, domain_prefix: impl Into<String>) -> Subscription {
        self.subscribe(Filter::Prefix(domain_prefix.into()))
    }

    /// Past events of `event_type`, oldest first, for a late subscriber
    /// that wants to catch up before switching to live delivery.
    pub fn history(&self, event_type: &str, after_id: u64, limit: usize) -> Vec<Event> {
        let store = self.executor.store().read_lock();
        store
            .stream_range(Key::stream(event_type).as_str(), after_id, limit)
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry.payload).ok())
            .collect()
    }
}
