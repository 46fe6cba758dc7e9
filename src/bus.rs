use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::warn;

pub const TOPIC_DASHBOARD: &str = "dashboard:changed";
pub const TOPIC_REMINDERS: &str = "reminders:changed";
pub const TOPIC_RECAP: &str = "recap:changed";
pub const TOPIC_CHARTS: &str = "charts:changed";

type Listener = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Topic-keyed observer registry used to tell unrelated screens their data
/// may be stale. Construct one instance per app (or per test) and hand it to
/// the view layer; there is no process global.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    topics: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Vec<(u64, Listener)>>> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, topic: &str, listener: F) -> Subscription
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry()
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        // Topics are never removed, only left empty.
        if let Some(entries) = self.registry().get_mut(&subscription.topic) {
            entries.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Invokes every listener currently registered for `topic`, in
    /// registration order. A panicking listener is contained so the rest
    /// still run and the publisher never observes the failure.
    pub fn publish(&self, topic: &str, payload: Option<&Value>) {
        let listeners: Vec<Listener> = {
            let registry = self.registry();
            match registry.get(topic) {
                Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
                None => return,
            }
        };

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                warn!(topic, "event listener panicked");
            }
        }
    }
}
