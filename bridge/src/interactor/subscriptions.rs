//! Topic subscription registry.
//!
//! An ordered, duplicate-free set of relay topics guarded by its own mutex.
//! The lock only covers membership; the caller emits the `sub` frame after
//! the lock is released, so the mutex is never held across I/O.

use parking_lot::Mutex;

/// Duplicate-free set of subscribed topics.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: Mutex<Vec<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a topic, returning `true` when it was not present before.
    /// Callers only emit a `sub` frame on `true` — subscribing twice to the
    /// same topic must produce at most one outbound frame.
    pub fn insert(&self, topic: &str) -> bool {
        let mut topics = self.topics.lock();
        if topics.iter().any(|t| t == topic) {
            return false;
        }
        topics.push(topic.to_owned());
        true
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.lock().iter().any(|t| t == topic)
    }

    /// Clears the set. Called on every disconnect so that a reconnected
    /// socket re-subscribes from scratch.
    pub fn reset(&self) {
        self.topics.lock().clear();
    }

    /// Snapshot of the subscribed topics, in insertion order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().clone()
    }
}
