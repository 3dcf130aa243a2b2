//! Ordered observer lists delivering over channels.
//!
//! Subscribers hand in an unbounded sender and get every notification
//! as a cloned value, in registration order. Because delivery is a
//! channel send, a subscriber can re-subscribe or unsubscribe from
//! inside its receiving task without deadlocking the notifier.

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Caller-chosen subscriber identity. Re-using an id replaces the
/// earlier registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u32);

impl SubscriberId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

struct Entry<T> {
    id: SubscriberId,
    tx: UnboundedSender<T>,
}

/// An ordered list of subscribers.
///
/// Notification clones the value once per live subscriber. Entries
/// whose receiving end has been dropped are pruned during `notify`.
pub struct Fanout<T: Clone> {
    entries: Vec<Entry<T>>,
}

impl<T: Clone> Default for Fanout<T> {
    fn default() -> Self {
        Fanout::new()
    }
}

impl<T: Clone> Fanout<T> {
    pub fn new() -> Fanout<T> {
        Fanout {
            entries: Vec::new(),
        }
    }

    /// Adds a subscriber. If `id` is already registered the old entry
    /// is removed first, so a re-subscribe moves to the end of the
    /// delivery order rather than duplicating.
    pub fn subscribe(&mut self, id: SubscriberId, tx: UnboundedSender<T>) {
        self.entries.retain(|e| e.id != id);
        self.entries.push(Entry { id, tx });
    }

    /// Removes a subscriber. Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Delivers `value` to every live subscriber in registration
    /// order. Subscribers whose channel has closed are dropped from
    /// the list. Returns the number of successful deliveries.
    pub fn notify(&mut self, value: T) -> usize {
        let mut delivered = 0;
        self.entries.retain(|e| {
            if e.tx.send(value.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(id = e.id.0, "pruning closed subscriber");
                false
            }
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A slot for at most one subscriber.
pub struct SingleSlot<T> {
    entry: Option<Entry<T>>,
}

impl<T> Default for SingleSlot<T> {
    fn default() -> Self {
        SingleSlot::new()
    }
}

impl<T> SingleSlot<T> {
    pub fn new() -> SingleSlot<T> {
        SingleSlot { entry: None }
    }

    /// Installs a subscriber, replacing any previous one.
    pub fn set(&mut self, id: SubscriberId, tx: UnboundedSender<T>) {
        self.entry = Some(Entry { id, tx });
    }

    /// Clears the slot only if `id` matches the current occupant, so
    /// a stale clear cannot evict someone else's registration.
    pub fn clear(&mut self, id: SubscriberId) -> bool {
        if self.entry.as_ref().is_some_and(|e| e.id == id) {
            self.entry = None;
            true
        } else {
            false
        }
    }

    /// Returns true if the value was delivered. A closed channel
    /// empties the slot.
    pub fn notify(&mut self, value: T) -> bool {
        match &self.entry {
            Some(e) => {
                if e.tx.send(value).is_ok() {
                    true
                } else {
                    debug!(id = e.id.0, "pruning closed slot subscriber");
                    self.entry = None;
                    false
                }
            }
            None => false,
        }
    }

    pub fn is_set(&self) -> bool {
        self.entry.is_some()
    }
}
