//! Change Notifier Module
//!
//! Per-key subscriber registry with coalesced, deferred delivery. Mutations
//! mark a key as changed; the host drains the marks with `flush()` once the
//! current synchronous burst is over, and each listener sees the key's
//! state at that moment. Only keys with at least one listener are marked,
//! so the pending set never outgrows the listener registry.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

/// Callback invoked with the latest value for a key, `None` once deleted.
pub type Listener<V> = Box<dyn Fn(Option<&V>) + Send + Sync>;

// == Subscription ==
/// Identifies exactly one registered listener.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping the subscription leaves the listener registered"]
pub struct Subscription {
    key: String,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }
}

// == Notifier ==
pub struct Notifier<V> {
    listeners: HashMap<String, Vec<(u64, Listener<V>)>>,
    pending: HashSet<String>,
    next_id: u64,
}

impl<V> Notifier<V> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            pending: HashSet::new(),
            next_id: 0,
        }
    }

    // == Subscribe ==
    pub fn subscribe(&mut self, key: &str, listener: Listener<V>) -> Subscription {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners
            .entry(key.to_string())
            .or_default()
            .push((id, listener));
        Subscription {
            key: key.to_string(),
            id,
        }
    }

    // == Unsubscribe ==
    /// Removes exactly the listener behind `subscription`. Returns whether it
    /// was still registered.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let Some(list) = self.listeners.get_mut(&subscription.key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(&subscription.key);
            self.pending.remove(&subscription.key);
        }
        removed
    }

    // == Publish ==
    /// Marks `key` as changed. Keys nobody listens to are ignored.
    ///
    /// Returns `true` when the mark turned an empty buffer non-empty, meaning
    /// the caller must arrange exactly one flush.
    pub fn publish(&mut self, key: &str) -> bool {
        if !self.listeners.contains_key(key) {
            return false;
        }
        let schedule = self.pending.is_empty();
        self.pending.insert(key.to_string());
        schedule
    }

    // == Flush ==
    /// Delivers the current value of each marked key, as returned by
    /// `lookup`, to its listeners and clears the marks. Returns the number of
    /// listener invocations.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run.
    pub fn flush<'a, F>(&mut self, lookup: F) -> usize
    where
        V: 'a,
        F: Fn(&str) -> Option<&'a V>,
    {
        if self.pending.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending);
        let mut delivered = 0;

        for key in &pending {
            let Some(list) = self.listeners.get(key) else {
                continue;
            };
            let value = lookup(key);
            for (id, listener) in list {
                let result = panic::catch_unwind(AssertUnwindSafe(|| listener(value)));
                match result {
                    Ok(()) => delivered += 1,
                    Err(_) => error!("Listener {} for key '{}' panicked during flush", id, key),
                }
            }
        }

        debug!(
            "Flushed {} pending key(s) to {} listener(s)",
            pending.len(),
            delivered
        );
        delivered
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }

    pub fn has_listeners(&self, key: &str) -> bool {
        self.listeners.contains_key(key)
    }

    /// Drops every listener and pending mark.
    pub fn clear(&mut self) {
        self.listeners.clear();
        self.pending.clear();
    }
}

impl<V> Default for Notifier<V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<Option<u32>>>>, Listener<u32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener<u32> = Box::new(move |v: Option<&u32>| sink.lock().unwrap().push(v.copied()));
        (seen, listener)
    }

    fn silent() -> Listener<u32> {
        Box::new(|_: Option<&u32>| {})
    }

    #[test]
    fn test_publish_schedules_once_per_burst() {
        let mut notifier: Notifier<u32> = Notifier::new();
        let _a = notifier.subscribe("k", silent());
        let _b = notifier.subscribe("other", silent());

        assert!(notifier.publish("k"));
        assert!(!notifier.publish("k"));
        assert!(!notifier.publish("other"));
        assert!(notifier.has_pending());

        notifier.flush(|_| None);
        assert!(!notifier.has_pending());
        assert!(notifier.publish("k"));
    }

    #[test]
    fn test_flush_delivers_value_at_flush_time() {
        let mut notifier = Notifier::new();
        let (seen, listener) = recorder();
        let _sub = notifier.subscribe("k", listener);
        let mut current: HashMap<String, u32> = HashMap::new();

        for v in 1..=3 {
            current.insert("k".to_string(), v);
            notifier.publish("k");
        }
        assert!(seen.lock().unwrap().is_empty());

        assert_eq!(notifier.flush(|key| current.get(key)), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Some(3)]);
    }

    #[test]
    fn test_flush_delivers_deletion_as_none() {
        let mut notifier = Notifier::new();
        let (seen, listener) = recorder();
        let _sub = notifier.subscribe("k", listener);

        notifier.publish("k");
        notifier.flush(|_| None);
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_listener() {
        let mut notifier = Notifier::new();
        let (first_seen, first) = recorder();
        let (second_seen, second) = recorder();
        let first_sub = notifier.subscribe("k", first);
        let second_sub = notifier.subscribe("k", second);

        assert!(notifier.unsubscribe(first_sub.clone()));
        assert!(!notifier.unsubscribe(first_sub));
        assert_eq!(notifier.listener_count("k"), 1);

        notifier.publish("k");
        notifier.flush(|_| Some(&7));
        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(*second_seen.lock().unwrap(), vec![Some(7)]);

        assert!(notifier.unsubscribe(second_sub));
        assert!(!notifier.has_listeners("k"));
    }

    #[test]
    fn test_panicking_listener_does_not_abort_delivery() {
        let mut notifier = Notifier::new();
        let _bad = notifier.subscribe("k", Box::new(|_: Option<&u32>| panic!("listener failure")));
        let (seen, listener) = recorder();
        let _good = notifier.subscribe("k", listener);

        notifier.publish("k");
        assert_eq!(notifier.flush(|_| Some(&5)), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Some(5)]);
        assert!(!notifier.has_pending());
    }

    #[test]
    fn test_unwatched_keys_are_not_buffered() {
        let mut notifier: Notifier<u32> = Notifier::new();
        for i in 0..1000 {
            assert!(!notifier.publish(&format!("key-{}", i)));
        }
        assert_eq!(notifier.pending_len(), 0);
        assert_eq!(notifier.flush(|_| None), 0);
    }

    #[test]
    fn test_last_unsubscribe_drops_pending_mark() {
        let mut notifier: Notifier<u32> = Notifier::new();
        let sub = notifier.subscribe("k", silent());
        notifier.publish("k");
        assert!(notifier.unsubscribe(sub));
        assert!(!notifier.has_pending());
    }
}
