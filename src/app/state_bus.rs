//! Versioned global state bus shared by the host and all applications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::domain::app::Props;
use crate::domain::state::StateSnapshot;

type Subscriber = Arc<dyn Fn(&StateSnapshot, &StateSnapshot) + Send + Sync>;

/// The only mutation entry point for cross-application state.
///
/// `set_global_state` applies the merge and fans out to every subscriber
/// before returning, so each subscriber observes the same fully-merged
/// snapshot pair and never a torn intermediate view.
pub struct GlobalStateBus {
    state: RwLock<StateSnapshot>,
    subscribers: Arc<Mutex<HashMap<u64, Subscriber>>>,
    next_id: AtomicU64,
}

impl GlobalStateBus {
    pub fn new(initial: Props) -> Self {
        Self {
            state: RwLock::new(StateSnapshot::new(initial)),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.read().clone()
    }

    /// Merge `partial` into the state and notify all subscribers
    /// synchronously. Returns the new snapshot.
    pub fn set_global_state(&self, partial: Props) -> StateSnapshot {
        let (prev, next) = {
            let mut state = self.state.write();
            let prev = state.clone();
            let next = prev.merged(&partial);
            *state = next.clone();
            (prev, next)
        };
        trace!(version = next.version(), keys = partial.len(), "global state merged");

        // Callbacks run outside the subscriber lock so a subscriber may
        // subscribe or unsubscribe from within its own callback.
        let callbacks: Vec<Subscriber> = self.subscribers.lock().values().cloned().collect();
        for callback in callbacks {
            callback(&next, &prev);
        }
        next
    }

    /// Register a change subscriber; drop-safe handle unsubscribes on demand.
    pub fn on_global_state_change<F>(&self, callback: F) -> StateSubscription
    where
        F: Fn(&StateSnapshot, &StateSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, Arc::new(callback));
        StateSubscription {
            id,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for GlobalStateBus {
    fn default() -> Self {
        Self::new(Props::new())
    }
}

/// Handle returned by [`GlobalStateBus::on_global_state_change`].
pub struct StateSubscription {
    id: u64,
    subscribers: Arc<Mutex<HashMap<u64, Subscriber>>>,
}

impl StateSubscription {
    pub fn unsubscribe(self) {
        self.subscribers.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    fn partial(key: &str, value: serde_json::Value) -> Props {
        let mut props = Props::new();
        props.insert(key.to_string(), value);
        props
    }

    #[test]
    fn merge_notifies_with_new_and_prev() {
        let bus = GlobalStateBus::default();
        let seen: Arc<PlMutex<Vec<(Option<String>, u64)>>> = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let _sub = bus.on_global_state_change(move |new, prev| {
            assert!(new.version() == prev.version() + 1);
            sink.lock().push((
                new.get("theme").and_then(|v| v.as_str()).map(String::from),
                new.version(),
            ));
        });

        bus.set_global_state(partial("theme", json!("dark")));
        bus.set_global_state(partial("theme", json!("light")));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (Some("dark".into()), 1));
        assert_eq!(seen[1], (Some("light".into()), 2));
    }

    #[test]
    fn all_subscribers_observe_the_same_final_state() {
        let bus = GlobalStateBus::default();
        let observed: Arc<PlMutex<Vec<StateSnapshot>>> = Arc::new(PlMutex::new(Vec::new()));

        let mut subs = Vec::new();
        for _ in 0..3 {
            let sink = Arc::clone(&observed);
            subs.push(bus.on_global_state_change(move |new, _| {
                sink.lock().push(new.clone());
            }));
        }

        let result = bus.set_global_state(partial("user", json!({"id": 7})));
        let observed = observed.lock();
        assert_eq!(observed.len(), 3);
        for snapshot in observed.iter() {
            assert_eq!(snapshot, &result);
        }
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = GlobalStateBus::default();
        let count = Arc::new(PlMutex::new(0usize));
        let sink = Arc::clone(&count);

        let sub = bus.on_global_state_change(move |_, _| *sink.lock() += 1);
        bus.set_global_state(partial("a", json!(1)));
        sub.unsubscribe();
        bus.set_global_state(partial("a", json!(2)));

        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribing_inside_a_callback_does_not_deadlock() {
        let bus = Arc::new(GlobalStateBus::default());
        let inner = Arc::clone(&bus);
        let _sub = bus.on_global_state_change(move |_, _| {
            inner.on_global_state_change(|_, _| {}).unsubscribe();
        });
        bus.set_global_state(partial("a", json!(1)));
    }
}
