//! Real-time snapshot subscriptions.
//!
//! Subscribers register a callback per key and receive the full state on
//! every change. Delivery order relative to the caller's own writes is not
//! guaranteed, so each payload must be treated as authoritative, never as a
//! delta.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct HubInner<T> {
    next_id: u64,
    subscribers: HashMap<String, Vec<(u64, Callback<T>)>>,
}

/// Fan-out of full-state snapshots to keyed subscribers.
pub struct SnapshotHub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T: 'static> SnapshotHub<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Register `callback` for `key`. The callback stays registered until the
    /// returned handle is dropped or unsubscribed.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .subscribers
                .entry(key.to_string())
                .or_default()
                .push((id, Arc::new(callback)));
            id
        };

        tracing::debug!("Subscribed {} to {}", id, key);

        let weak: Weak<Mutex<HubInner<T>>> = Arc::downgrade(&self.inner);
        let key = key.to_string();
        Subscription {
            release: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(list) = inner.subscribers.get_mut(&key) {
                        list.retain(|(sub_id, _)| *sub_id != id);
                        if list.is_empty() {
                            inner.subscribers.remove(&key);
                        }
                    }
                }
            })),
        }
    }

    /// Deliver `value` to every subscriber of `key`.
    ///
    /// Callbacks run on the publishing thread, outside the hub's lock.
    pub fn publish(&self, key: &str, value: &T) {
        let callbacks: Vec<Callback<T>> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.subscribers.get(key) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        for callback in callbacks {
            callback(value);
        }
    }

    /// Number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.get(key).map_or(0, Vec::len)
    }
}

impl<T: 'static> Default for SnapshotHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Stop receiving snapshots.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
