//! Capability coordinator engine
//!
//! The core transaction logic that drives the three-phase capability
//! swap: session tracking, per-phone barriers, timeout, and rollback.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use xbar_ril::{
    CapabilityPhase, CapabilityStatus, ModemError, ModemId, ModemRequest, ModemResponse, PhoneId,
    RadioAccessFamily, RadioCapability, SessionId,
};

use crate::error::SwitchError;
use crate::events::SwitchEvent;
use crate::state::{KeepAliveGuard, PhoneDescriptor, PhoneSlot, SlotStatus};

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long every phone gets to answer before the transaction is
    /// failed (ms)
    pub timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { timeout_ms: 45_000 }
    }
}

/// Result of accepting a capability request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Every phone already holds its requested capability; nothing
    /// was sent
    NoChange,
    /// A transaction started under this session
    Started { session: SessionId },
}

/// The capability coordinator engine
pub struct CapabilityCoordinator {
    config: CoordinatorConfig,
    slots: Vec<PhoneSlot>,
    session: SessionId,
    phase: CapabilityPhase,
    pending: u32,
    failed: bool,
    guard: KeepAliveGuard,
    deadline: Option<(Instant, SessionId)>,
    request_buffer: Vec<(PhoneId, ModemRequest)>,
    event_buffer: Vec<SwitchEvent>,
}

impl CapabilityCoordinator {
    /// Create a new coordinator with default configuration
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            session: SessionId(0),
            phase: CapabilityPhase::Configured,
            pending: 0,
            failed: false,
            guard: KeepAliveGuard::new(),
            deadline: None,
            request_buffer: Vec::new(),
            event_buffer: Vec::new(),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Register a phone with the coordinator
    pub fn add_phone(&mut self, desc: PhoneDescriptor) -> PhoneId {
        let phone_id = PhoneId(self.slots.len() as u32);
        info!(%phone_id, modem = %desc.modem_id, raf = %desc.capability, "added phone");
        self.slots.push(PhoneSlot::new(phone_id, desc));
        phone_id
    }

    /// Number of registered phones
    pub fn phone_count(&self) -> usize {
        self.slots.len()
    }

    /// Get one phone's slot
    pub fn slot(&self, phone_id: PhoneId) -> Option<&PhoneSlot> {
        self.slots.get(phone_id.as_index())
    }

    /// Live capability of one phone
    pub fn capability_for(&self, phone_id: PhoneId) -> Option<RadioAccessFamily> {
        self.slots.get(phone_id.as_index()).map(|s| s.capability)
    }

    /// The richest supported access family across phones, ranked by
    /// technology bit count
    pub fn max_supported_capability(&self) -> RadioAccessFamily {
        self.slots
            .iter()
            .map(|s| s.supported)
            .max_by_key(|r| r.bit_count())
            .unwrap_or(RadioAccessFamily::UNKNOWN)
    }

    /// The most limited supported access family across phones
    pub fn min_supported_capability(&self) -> RadioAccessFamily {
        self.slots
            .iter()
            .map(|s| s.supported)
            .min_by_key(|r| r.bit_count())
            .unwrap_or(RadioAccessFamily::UNKNOWN)
    }

    /// The live session id
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Check if any slot is inside a transaction
    pub fn is_transaction_live(&self) -> bool {
        self.slots.iter().any(|s| !s.status.is_idle())
    }

    /// Check if the keep-alive guard is held
    pub fn is_guard_held(&self) -> bool {
        self.guard.is_held()
    }

    fn issue_session(&mut self) -> SessionId {
        self.session = self.session.next();
        self.session
    }

    /// Request a new capability assignment, one entry per phone.
    ///
    /// Rejected outright when the count is wrong or a transaction is
    /// already live; requests are never queued. When every phone
    /// already matches, succeeds without sending anything.
    pub fn set_capability(
        &mut self,
        requested: &[RadioAccessFamily],
    ) -> Result<SetOutcome, SwitchError> {
        if requested.len() != self.slots.len() {
            return Err(SwitchError::PhoneCountMismatch {
                expected: self.slots.len(),
                got: requested.len(),
            });
        }
        for slot in &self.slots {
            if !slot.status.is_idle() {
                warn!(
                    phone = slot.phone_id.as_u32(),
                    status = slot.status.name(),
                    "rejecting capability request, transaction in progress"
                );
                return Err(SwitchError::TransactionInProgress);
            }
        }

        // Check we actually need to do anything
        let same = self
            .slots
            .iter()
            .zip(requested)
            .all(|(slot, raf)| slot.capability == *raf);
        if same {
            debug!("already in requested configuration, nothing to do");
            return Ok(SetOutcome::NoChange);
        }

        // Clear to be sure we start from the initial state, then keep
        // the host awake until the transaction resolves
        self.clear_transaction();
        self.guard.acquire();

        let session = self.start_transaction(requested);
        Ok(SetOutcome::Started { session })
    }

    /// Begin a transaction toward `requested`
    fn start_transaction(&mut self, requested: &[RadioAccessFamily]) -> SessionId {
        let session = self.issue_session();
        info!(%session, "starting capability transaction");

        self.phase = CapabilityPhase::Start;
        self.pending = self.slots.len() as u32;
        self.failed = false;
        self.deadline = Some((
            Instant::now() + Duration::from_millis(self.config.timeout_ms),
            session,
        ));
        self.event_buffer
            .push(SwitchEvent::TransactionStarted { session });

        // For each requested family, the modem currently holding it
        // (empty when nobody does)
        let holders: Vec<ModemId> = requested
            .iter()
            .map(|raf| {
                self.slots
                    .iter()
                    .find(|s| s.capability == *raf)
                    .map(|s| s.modem_id.clone())
                    .unwrap_or_else(ModemId::none)
            })
            .collect();

        for (slot, (raf, holder)) in self
            .slots
            .iter_mut()
            .zip(requested.iter().zip(holders))
        {
            slot.old_capability = slot.capability;
            slot.new_capability = *raf;
            slot.current_modem_id = slot.modem_id.clone();
            slot.new_modem_id = holder;
            set_status(slot, SlotStatus::Starting, &mut self.event_buffer);
            slot.awaiting_reply = true;

            debug!(
                phone = slot.phone_id.as_u32(),
                old = %slot.old_capability,
                new = %slot.new_capability,
                "START"
            );
            let cap = RadioCapability {
                phone_id: slot.phone_id,
                session,
                phase: CapabilityPhase::Start,
                raf: slot.new_capability,
                modem_id: slot.current_modem_id.clone(),
                status: CapabilityStatus::None,
            };
            self.request_buffer
                .push((slot.phone_id, ModemRequest::SetCapability { cap }));
        }

        session
    }

    /// Begin the transaction that reverts a failed one.
    ///
    /// The targets are the capability and modem binding captured when
    /// the failed transaction started, not a fresh scan: live
    /// capabilities are half-switched at this point and scanning them
    /// would pair phones with the wrong modems.
    fn start_rollback(&mut self) {
        let session = self.issue_session();
        info!(%session, "rolling back to previous capabilities");

        self.phase = CapabilityPhase::Start;
        self.pending = self.slots.len() as u32;
        self.failed = false;
        self.deadline = Some((
            Instant::now() + Duration::from_millis(self.config.timeout_ms),
            session,
        ));
        self.event_buffer
            .push(SwitchEvent::TransactionStarted { session });

        for slot in self.slots.iter_mut() {
            slot.new_capability = slot.old_capability;
            slot.new_modem_id = slot.current_modem_id.clone();
            set_status(slot, SlotStatus::Starting, &mut self.event_buffer);
            slot.awaiting_reply = true;

            debug!(
                phone = slot.phone_id.as_u32(),
                target = %slot.new_capability,
                "rollback START"
            );
            let cap = RadioCapability {
                phone_id: slot.phone_id,
                session,
                phase: CapabilityPhase::Start,
                raf: slot.new_capability,
                modem_id: slot.current_modem_id.clone(),
                status: CapabilityStatus::None,
            };
            self.request_buffer
                .push((slot.phone_id, ModemRequest::SetCapability { cap }));
        }
    }

    /// Process a message from a modem
    pub fn process_modem_response(&mut self, response: ModemResponse) {
        match response {
            ModemResponse::CapabilityAck {
                phone_id,
                cap,
                error,
            } => match cap.phase {
                CapabilityPhase::Start => self.on_start_ack(phone_id, cap, error),
                CapabilityPhase::Apply => self.on_apply_ack(phone_id, cap, error),
                CapabilityPhase::Finish => self.on_finish_ack(phone_id, cap),
                other => {
                    warn!(
                        phone = phone_id.as_u32(),
                        phase = other.name(),
                        "unexpected ack phase"
                    );
                }
            },
            ModemResponse::CapabilityChanged {
                phone_id,
                cap,
                error,
            } => self.on_capability_changed(phone_id, cap, error),
            ModemResponse::RadioStateChanged { phone_id, state } => {
                // Radio power state is tracked upstream; nothing for
                // the transaction machinery to do with it
                debug!(
                    phone = phone_id.as_u32(),
                    state = state.name(),
                    "radio state changed"
                );
            }
        }
    }

    fn is_stale(&self, cap: &RadioCapability) -> bool {
        if cap.session != self.session {
            debug!(
                got = cap.session.0,
                live = self.session.0,
                phase = cap.phase.name(),
                "discarding stale capability message"
            );
            return true;
        }
        false
    }

    fn on_start_ack(&mut self, phone_id: PhoneId, cap: RadioCapability, error: Option<ModemError>) {
        if self.is_stale(&cap) || self.phase != CapabilityPhase::Start {
            return;
        }

        // A failed START cannot be repaired by FINISH when there is
        // only one phone, and an unsupported request will fail the
        // same way on retry. Abort the whole transaction.
        if error.is_some()
            && (self.slots.len() == 1 || error == Some(ModemError::RequestNotSupported))
        {
            warn!(phone = phone_id.as_u32(), ?error, "aborting transaction at START");
            self.issue_session();
            self.event_buffer.push(SwitchEvent::CapabilitySetFailed);
            self.clear_transaction();
            return;
        }

        let Some(slot) = self.slots.get_mut(phone_id.as_index()) else {
            warn!(phone = phone_id.as_u32(), "START ack for unknown phone");
            return;
        };
        if slot.status != SlotStatus::Starting || !slot.awaiting_reply {
            debug!(
                phone = phone_id.as_u32(),
                status = slot.status.name(),
                "START ack not expected here"
            );
            return;
        }
        slot.awaiting_reply = false;

        if error.is_some() {
            set_status(slot, SlotStatus::Fail, &mut self.event_buffer);
            self.failed = true;
        } else {
            set_status(slot, SlotStatus::Started, &mut self.event_buffer);
        }

        self.pending = self.pending.saturating_sub(1);
        debug!(
            phone = phone_id.as_u32(),
            pending = self.pending,
            "START ack counted"
        );
        if self.pending == 0 {
            self.check_modem_assignment();
            if self.failed {
                self.issue_finish();
            } else {
                self.issue_apply();
            }
        }
    }

    /// Every phone answered START; make sure no logical modem was
    /// promised to two phones before anything is applied.
    fn check_modem_assignment(&mut self) {
        let mut in_use = HashSet::new();
        for slot in &self.slots {
            if !in_use.insert(slot.new_modem_id.clone()) {
                error!(
                    modem = %slot.new_modem_id,
                    "same logical modem assigned to different phones"
                );
                self.failed = true;
                self.event_buffer.push(SwitchEvent::Error {
                    source: "coordinator".to_string(),
                    message: format!(
                        "logical modem {} assigned to more than one phone",
                        slot.new_modem_id
                    ),
                });
            }
        }
    }

    fn issue_apply(&mut self) {
        self.phase = CapabilityPhase::Apply;
        self.pending = self.slots.len() as u32;
        let session = self.session;
        for slot in self.slots.iter_mut() {
            set_status(slot, SlotStatus::Applying, &mut self.event_buffer);
            slot.awaiting_reply = true;

            debug!(phone = slot.phone_id.as_u32(), raf = %slot.new_capability, "APPLY");
            let cap = RadioCapability {
                phone_id: slot.phone_id,
                session,
                phase: CapabilityPhase::Apply,
                raf: slot.new_capability,
                modem_id: slot.new_modem_id.clone(),
                status: CapabilityStatus::None,
            };
            self.request_buffer
                .push((slot.phone_id, ModemRequest::SetCapability { cap }));
        }
    }

    fn on_apply_ack(&mut self, phone_id: PhoneId, cap: RadioCapability, error: Option<ModemError>) {
        if self.is_stale(&cap) || self.phase != CapabilityPhase::Apply {
            return;
        }
        // The real completion signal is the unsolicited notification;
        // a solicited APPLY ack only matters when it carries an error.
        if error.is_some() {
            warn!(phone = phone_id.as_u32(), ?error, "APPLY rejected");
            if let Some(slot) = self.slots.get_mut(phone_id.as_index()) {
                set_status(slot, SlotStatus::Fail, &mut self.event_buffer);
            }
            self.failed = true;
        } else {
            debug!(phone = phone_id.as_u32(), "APPLY accepted, expecting notification");
        }
    }

    fn on_capability_changed(
        &mut self,
        phone_id: PhoneId,
        cap: RadioCapability,
        error: Option<ModemError>,
    ) {
        if self.is_stale(&cap) || self.phase != CapabilityPhase::Apply {
            return;
        }
        let Some(slot) = self.slots.get_mut(phone_id.as_index()) else {
            warn!(phone = phone_id.as_u32(), "notification for unknown phone");
            return;
        };
        if !slot.awaiting_reply {
            debug!(phone = phone_id.as_u32(), "duplicate notification discarded");
            return;
        }
        slot.awaiting_reply = false;

        if error.is_some() || cap.status == CapabilityStatus::Fail {
            warn!(phone = phone_id.as_u32(), "capability change failed modem-side");
            set_status(slot, SlotStatus::Fail, &mut self.event_buffer);
            self.failed = true;
        } else {
            set_status(slot, SlotStatus::Success, &mut self.event_buffer);
            // The new family is live on the modem from this point on;
            // if the transaction still fails, rollback starts from
            // this value
            slot.capability = cap.raf;
            debug!(phone = phone_id.as_u32(), raf = %cap.raf, "capability applied");
        }

        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.issue_finish();
        }
    }

    /// Distribute the outcome to every phone, successful or not.
    fn issue_finish(&mut self) {
        self.phase = CapabilityPhase::Finish;
        let session = self.session;
        let failed = self.failed;
        for slot in self.slots.iter_mut() {
            self.pending += 1;
            slot.awaiting_reply = true;
            if failed {
                // At least one phone failed, mark them all failed
                set_status(slot, SlotStatus::Fail, &mut self.event_buffer);
            }

            debug!(
                phone = slot.phone_id.as_u32(),
                %session,
                failed,
                "FINISH"
            );
            let cap = RadioCapability {
                phone_id: slot.phone_id,
                session,
                phase: CapabilityPhase::Finish,
                raf: if failed {
                    slot.old_capability
                } else {
                    slot.new_capability
                },
                modem_id: if failed {
                    slot.current_modem_id.clone()
                } else {
                    slot.new_modem_id.clone()
                },
                status: if failed {
                    CapabilityStatus::Fail
                } else {
                    CapabilityStatus::Success
                },
            };
            self.request_buffer
                .push((slot.phone_id, ModemRequest::SetCapability { cap }));
        }
    }

    fn on_finish_ack(&mut self, phone_id: PhoneId, cap: RadioCapability) {
        if self.is_stale(&cap) || self.phase != CapabilityPhase::Finish {
            return;
        }
        let Some(slot) = self.slots.get_mut(phone_id.as_index()) else {
            warn!(phone = phone_id.as_u32(), "FINISH ack for unknown phone");
            return;
        };
        if !slot.awaiting_reply {
            debug!(phone = phone_id.as_u32(), "duplicate FINISH ack discarded");
            return;
        }
        slot.awaiting_reply = false;

        self.pending = self.pending.saturating_sub(1);
        debug!(
            phone = phone_id.as_u32(),
            pending = self.pending,
            "FINISH ack counted"
        );
        if self.pending == 0 {
            self.complete_transaction();
        }
    }

    /// Every phone answered FINISH: either commit and go idle, or
    /// roll back toward the previous configuration.
    fn complete_transaction(&mut self) {
        if !self.failed {
            // Commit the modem bindings; an empty target means no
            // modem held the requested family and the phone stays on
            // its own
            for slot in self.slots.iter_mut() {
                if !slot.new_modem_id.is_empty() {
                    slot.modem_id = slot.new_modem_id.clone();
                }
            }
            let capabilities: Vec<(PhoneId, RadioAccessFamily)> = self
                .slots
                .iter()
                .map(|s| (s.phone_id, s.capability))
                .collect();
            info!(session = self.session.0, "capability transaction complete");
            self.event_buffer
                .push(SwitchEvent::CapabilitySetDone { capabilities });
            // Make messages about the old transaction (specifically
            // the timeout) obsolete
            self.issue_session();
            self.clear_transaction();
            return;
        }

        warn!(session = self.session.0, "capability transaction failed");
        self.event_buffer.push(SwitchEvent::CapabilitySetFailed);
        self.failed = false;

        let unchanged = self
            .slots
            .iter()
            .all(|s| s.capability == s.old_capability);
        if unchanged {
            // Nothing was ever applied; no need to run the protocol
            // backwards toward where we already are
            debug!("rollback short-circuit, no capability changed");
            self.issue_session();
            self.clear_transaction();
            return;
        }

        // Revert. The guard stays held until the rollback transaction
        // itself resolves.
        self.start_rollback();
    }

    /// Fail the live transaction because a phone took too long.
    ///
    /// `timed_out` is the session the timer was armed for; a timer
    /// belonging to an earlier transaction is ignored.
    pub fn handle_timeout(&mut self, timed_out: SessionId) {
        if timed_out != self.session {
            debug!(
                timer = timed_out.0,
                live = self.session.0,
                "ignoring timeout for old session"
            );
            return;
        }
        for slot in &self.slots {
            warn!(
                phone = slot.phone_id.as_u32(),
                status = slot.status.name(),
                "transaction timed out"
            );
        }
        // New session first so the FINISH about to go out stays valid
        // while every straggler reply gets discarded as stale
        self.issue_session();
        self.pending = 0;
        self.failed = true;
        self.issue_finish();
    }

    /// Fire the timeout if its deadline has passed
    pub fn poll_deadline(&mut self, now: Instant) {
        if let Some((at, session)) = self.deadline {
            if now >= at {
                self.deadline = None;
                self.handle_timeout(session);
            }
        }
    }

    /// Reset all transaction state and release the keep-alive guard
    pub fn clear_transaction(&mut self) {
        debug!("clearing transaction state");
        for slot in self.slots.iter_mut() {
            slot.reset_transaction_state();
        }
        self.phase = CapabilityPhase::Configured;
        self.pending = 0;
        self.failed = false;
        self.deadline = None;
        self.guard.release();
    }

    /// Replace the phone set (multi-SIM configuration change).
    ///
    /// A transaction in flight is force-aborted: FINISH against a
    /// phone set about to be reshaped could address slots that no
    /// longer exist.
    pub fn reconfigure_phones(&mut self, descriptors: Vec<PhoneDescriptor>) {
        if self.is_transaction_live() {
            warn!("phone reconfiguration during live transaction, aborting it");
            self.event_buffer.push(SwitchEvent::CapabilitySetFailed);
            self.issue_session();
            self.clear_transaction();
        }

        let old_count = self.slots.len();
        self.slots.truncate(descriptors.len());
        for (i, desc) in descriptors.into_iter().enumerate() {
            if let Some(slot) = self.slots.get_mut(i) {
                // Surviving slots keep their live capability and modem
                slot.supported = desc.supported;
            } else {
                self.slots.push(PhoneSlot::new(PhoneId(i as u32), desc));
            }
        }
        info!(from = old_count, to = self.slots.len(), "phone set reconfigured");
        self.event_buffer.push(SwitchEvent::PhonesReconfigured {
            count: self.slots.len(),
        });
    }

    /// Drain buffered requests bound for modems
    pub fn drain_requests(&mut self) -> Vec<(PhoneId, ModemRequest)> {
        std::mem::take(&mut self.request_buffer)
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<SwitchEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}

impl Default for CapabilityCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn set_status(slot: &mut PhoneSlot, status: SlotStatus, events: &mut Vec<SwitchEvent>) {
    if slot.status != status {
        slot.status = status;
        events.push(SwitchEvent::PhoneStatusChanged {
            phone_id: slot.phone_id,
            status,
        });
    }
}
