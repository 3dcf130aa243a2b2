//! Active phone count tracking for multi-SIM configuration changes.

use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use xbar_fanout::{Fanout, SubscriberId};

/// Tracks how many phones are active and tells subscribers when the
/// count changes (single-SIM to dual-SIM switches and back).
///
/// Subscribers typically react by rebuilding per-phone state and
/// handing the coordinator a matching set of phone descriptors.
pub struct MultiSimNotifier {
    active_count: usize,
    subscribers: Fanout<usize>,
}

impl MultiSimNotifier {
    pub fn new(active_count: usize) -> MultiSimNotifier {
        MultiSimNotifier {
            active_count,
            subscribers: Fanout::new(),
        }
    }

    pub fn active_phone_count(&self) -> usize {
        self.active_count
    }

    pub fn subscribe(&mut self, id: SubscriberId, tx: UnboundedSender<usize>) {
        self.subscribers.subscribe(id, tx);
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Update the count. Subscribers hear about changes only.
    pub fn set_active_phone_count(&mut self, count: usize) {
        if count == self.active_count {
            return;
        }
        info!(from = self.active_count, to = count, "active phone count changed");
        self.active_count = count;
        self.subscribers.notify(count);
    }
}
