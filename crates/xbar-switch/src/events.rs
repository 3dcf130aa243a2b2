//! Unified event stream for the capability coordinator
//!
//! Everything the coordinator does (phone lifecycle, transaction
//! progress, terminal outcomes) is emitted through a single event
//! channel, so one observer sees the whole story in order.

use xbar_ril::{PhoneId, RadioAccessFamily, SessionId};

use crate::link::ModemLinkMeta;
use crate::state::SlotStatus;

/// Unified event enum for all coordinator activity
#[derive(Debug, Clone)]
pub enum SwitchEvent {
    // -------------------------------------------------------------------------
    // Phone lifecycle events
    // -------------------------------------------------------------------------
    /// A phone was registered with the coordinator
    PhoneAdded {
        /// Slot assigned to this phone
        phone_id: PhoneId,
        /// Metadata about the modem link
        meta: ModemLinkMeta,
    },

    /// The phone set was reconfigured (multi-SIM switch)
    PhonesReconfigured {
        /// New number of phones
        count: usize,
    },

    // -------------------------------------------------------------------------
    // Transaction progress events
    // -------------------------------------------------------------------------
    /// A capability transaction began
    TransactionStarted {
        /// Session id the transaction runs under
        session: SessionId,
    },

    /// One phone moved to a new transaction status
    PhoneStatusChanged {
        /// Phone whose status changed
        phone_id: PhoneId,
        /// New status
        status: SlotStatus,
    },

    // -------------------------------------------------------------------------
    // Terminal outcome events
    // -------------------------------------------------------------------------
    /// The transaction committed; every phone's capability after the
    /// swap
    CapabilitySetDone {
        /// Final (phone, access family) assignment
        capabilities: Vec<(PhoneId, RadioAccessFamily)>,
    },

    /// The transaction failed; capabilities were rolled back (or were
    /// never changed)
    CapabilitySetFailed,

    /// An error occurred in the coordinator
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl SwitchEvent {
    /// Check if this event ends a transaction
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwitchEvent::CapabilitySetDone { .. } | SwitchEvent::CapabilitySetFailed
        )
    }

    /// Check if this is a transaction progress event
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            SwitchEvent::TransactionStarted { .. } | SwitchEvent::PhoneStatusChanged { .. }
        )
    }

    /// Get the phone id if this event concerns a specific phone
    pub fn phone_id(&self) -> Option<PhoneId> {
        match self {
            SwitchEvent::PhoneAdded { phone_id, .. }
            | SwitchEvent::PhoneStatusChanged { phone_id, .. } => Some(*phone_id),
            _ => None,
        }
    }
}
