//! Event subscription table: type-keyed fan-out to ordered handler lists.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Callback invoked with an event's `data` payload
pub type EventHandler = dyn FnMut(&Value) + Send;

type SharedHandler = Arc<Mutex<EventHandler>>;

/// Identity of one registered handler
///
/// Ids are unique per table for the lifetime of the process, so removal is
/// by identity: two structurally identical subscriptions get distinct ids
/// and can be removed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Mapping from event-type name to an ordered list of handlers
///
/// Insertion order determines delivery order. Dispatch snapshots the handler
/// list before invoking anything, so a handler may subscribe or unsubscribe
/// reentrantly without deadlocking; an `off` issued mid-dispatch takes
/// effect from the next event onwards.
#[derive(Default)]
pub struct SubscriptionTable {
    handlers: Mutex<HashMap<String, Vec<(SubscriptionId, SharedHandler)>>>,
    next_id: AtomicU64,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event type, returning its id
    pub fn insert(
        &self,
        event: &str,
        handler: impl FnMut(&Value) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.lock();
        handlers
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(Mutex::new(handler))));
        id
    }

    /// Remove the handler registered under `id` for `event`
    ///
    /// Other handlers for the same event type are unaffected. Returns false
    /// if no such registration exists.
    pub fn remove(&self, event: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        if let Some(list) = handlers.get_mut(event) {
            let before = list.len();
            list.retain(|(entry_id, _)| *entry_id != id);
            let removed = list.len() < before;
            if list.is_empty() {
                handlers.remove(event);
            }
            return removed;
        }
        false
    }

    /// Remove every registration
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Number of handlers registered for an event type
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }

    /// Total number of registrations across all event types
    pub fn len(&self) -> usize {
        self.handlers.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every handler registered for `event`, in subscription order
    pub fn dispatch(&self, event: &str, data: &Value) {
        let snapshot: Vec<SharedHandler> = {
            let handlers = self.handlers.lock();
            match handlers.get(event) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => {
                    debug!("No subscribers for event type: {}", event);
                    return;
                }
            }
        };

        for handler in snapshot {
            (&mut *handler.lock())(data);
        }
    }
}
