//! Radio power state tracking with conditional subscription lists.
//!
//! Five lists watch one modem's [`RadioState`] from different angles.
//! Registration fires immediately when the current state already
//! satisfies the list's condition, so a late subscriber does not miss
//! a transition that happened before it arrived.

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use xbar_ril::RadioState;

use crate::registry::{Fanout, SubscriberId};

/// Tracks a radio's power state and notifies interested lists on
/// transitions.
pub struct RadioStateWatch {
    state: RadioState,
    state_changed: Fanout<RadioState>,
    on: Fanout<RadioState>,
    available: Fanout<RadioState>,
    not_available: Fanout<RadioState>,
    off_or_not_available: Fanout<RadioState>,
}

impl RadioStateWatch {
    pub fn new(initial: RadioState) -> RadioStateWatch {
        RadioStateWatch {
            state: initial,
            state_changed: Fanout::new(),
            on: Fanout::new(),
            available: Fanout::new(),
            not_available: Fanout::new(),
            off_or_not_available: Fanout::new(),
        }
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Subscribe to every state transition. Always fires immediately
    /// with the current state.
    pub fn subscribe_state_changed(&mut self, id: SubscriberId, tx: UnboundedSender<RadioState>) {
        let _ = tx.send(self.state);
        self.state_changed.subscribe(id, tx);
    }

    /// Subscribe to the radio turning on. Fires immediately if it
    /// already is.
    pub fn subscribe_on(&mut self, id: SubscriberId, tx: UnboundedSender<RadioState>) {
        if self.state.is_on() {
            let _ = tx.send(self.state);
        }
        self.on.subscribe(id, tx);
    }

    /// Subscribe to the radio becoming available. Fires immediately
    /// unless it is currently unavailable.
    pub fn subscribe_available(&mut self, id: SubscriberId, tx: UnboundedSender<RadioState>) {
        if self.state.is_available() {
            let _ = tx.send(self.state);
        }
        self.available.subscribe(id, tx);
    }

    /// Subscribe to the radio becoming unavailable. Fires immediately
    /// if it already is.
    pub fn subscribe_not_available(&mut self, id: SubscriberId, tx: UnboundedSender<RadioState>) {
        if !self.state.is_available() {
            let _ = tx.send(self.state);
        }
        self.not_available.subscribe(id, tx);
    }

    /// Subscribe to the radio leaving the on state. Fires immediately
    /// if it is currently off or unavailable.
    pub fn subscribe_off_or_not_available(
        &mut self,
        id: SubscriberId,
        tx: UnboundedSender<RadioState>,
    ) {
        if !self.state.is_on() {
            let _ = tx.send(self.state);
        }
        self.off_or_not_available.subscribe(id, tx);
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.state_changed.unsubscribe(id);
        self.on.unsubscribe(id);
        self.available.unsubscribe(id);
        self.not_available.unsubscribe(id);
        self.off_or_not_available.unsubscribe(id);
    }

    /// Applies a new state. Nothing is notified when the state is
    /// unchanged unless `force` is set; a forced re-notification only
    /// reaches the unconditional state-changed list, since no
    /// transition condition can hold when old and new are equal.
    pub fn set_state(&mut self, new: RadioState, force: bool) {
        let old = self.state;
        self.state = new;
        if old == new && !force {
            return;
        }
        debug!(old = old.name(), new = new.name(), force, "radio state");

        self.state_changed.notify(new);
        if new.is_available() && !old.is_available() {
            self.available.notify(new);
        }
        if !new.is_available() && old.is_available() {
            self.not_available.notify(new);
        }
        if new.is_on() && !old.is_on() {
            self.on.notify(new);
        }
        if !new.is_on() && old.is_on() {
            self.off_or_not_available.notify(new);
        }
    }
}
