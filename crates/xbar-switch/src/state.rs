//! Per-phone slot state and transaction bookkeeping types.

use tracing::debug;
use xbar_ril::{ModemId, PhoneId, RadioAccessFamily};

/// Where one phone stands inside the current transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// No transaction touching this slot.
    Idle,
    /// START sent, waiting for the ack.
    Starting,
    /// START acknowledged.
    Started,
    /// APPLY sent, waiting for the unsolicited completion.
    Applying,
    /// The new configuration took effect modem-side.
    Success,
    /// This slot failed; the transaction will roll back.
    Fail,
}

impl SlotStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SlotStatus::Idle => "IDLE",
            SlotStatus::Starting => "STARTING",
            SlotStatus::Started => "STARTED",
            SlotStatus::Applying => "APPLYING",
            SlotStatus::Success => "SUCCESS",
            SlotStatus::Fail => "FAIL",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SlotStatus::Idle)
    }
}

/// Initial description of a phone handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneDescriptor {
    pub capability: RadioAccessFamily,
    pub supported: RadioAccessFamily,
    pub modem_id: ModemId,
}

/// One phone's slot: its live configuration plus the scratch fields a
/// transaction works through.
#[derive(Debug, Clone)]
pub struct PhoneSlot {
    pub phone_id: PhoneId,
    /// The access family currently in effect.
    pub capability: RadioAccessFamily,
    /// Everything this phone's hardware could take on.
    pub supported: RadioAccessFamily,
    /// Logical modem currently serving this phone.
    pub modem_id: ModemId,

    pub status: SlotStatus,
    /// Set when a phase request has been issued for this slot and its
    /// reply has not been counted yet.
    pub awaiting_reply: bool,

    // Transaction scratch, valid only while a transaction is live
    pub old_capability: RadioAccessFamily,
    pub new_capability: RadioAccessFamily,
    pub current_modem_id: ModemId,
    pub new_modem_id: ModemId,
}

impl PhoneSlot {
    pub fn new(phone_id: PhoneId, desc: PhoneDescriptor) -> PhoneSlot {
        PhoneSlot {
            phone_id,
            capability: desc.capability,
            supported: desc.supported,
            modem_id: desc.modem_id,
            status: SlotStatus::Idle,
            awaiting_reply: false,
            old_capability: RadioAccessFamily::UNKNOWN,
            new_capability: RadioAccessFamily::UNKNOWN,
            current_modem_id: ModemId::none(),
            new_modem_id: ModemId::none(),
        }
    }

    /// Clears everything a transaction wrote, back to idle.
    pub fn reset_transaction_state(&mut self) {
        self.status = SlotStatus::Idle;
        self.awaiting_reply = false;
        self.old_capability = RadioAccessFamily::UNKNOWN;
        self.new_capability = RadioAccessFamily::UNKNOWN;
        self.current_modem_id = ModemId::none();
        self.new_modem_id = ModemId::none();
    }
}

/// Keeps the host awake while a transaction is in flight.
///
/// Acquire and release are both idempotent: rollback re-enters the
/// transaction path with the guard already held, and the final clear
/// must be safe to run from any state.
#[derive(Debug, Default)]
pub struct KeepAliveGuard {
    held: bool,
}

impl KeepAliveGuard {
    pub fn new() -> KeepAliveGuard {
        KeepAliveGuard { held: false }
    }

    pub fn acquire(&mut self) {
        if !self.held {
            debug!("keep-alive guard acquired");
            self.held = true;
        }
    }

    pub fn release(&mut self) {
        if self.held {
            debug!("keep-alive guard released");
            self.held = false;
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}
