//! Virtual modem simulation
//!
//! Provides a simulated modem that answers capability transaction
//! phases and records the device state pushed at it, with scriptable
//! failure modes for exercising the coordinator's unhappy paths.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use xbar_ril::{
    AccessNetwork, CapabilityPhase, CapabilityStatus, DeviceStateKind, IndicationFilter,
    ModemError, ModemId, ModemRequest, ModemResponse, PhoneId, RadioAccessFamily, RadioCapability,
    RadioState,
};

/// Failure knobs for a virtual modem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualModemConfig {
    /// Answer START with an error
    pub fail_start: bool,
    /// Which error a failed START carries
    pub start_error: ModemError,
    /// Answer APPLY with an error
    pub fail_apply: bool,
    /// Report Fail status in the unsolicited notification
    pub fail_notification: bool,
    /// Never answer START at all (exercises the timeout)
    pub drop_start_ack: bool,
    /// Ack APPLY but never send the notification
    pub drop_notification: bool,
    /// Delay before each batch of responses (ms)
    pub response_delay_ms: u64,
}

impl Default for VirtualModemConfig {
    fn default() -> Self {
        Self {
            fail_start: false,
            start_error: ModemError::ModemInternal,
            fail_apply: false,
            fail_notification: false,
            drop_start_ack: false,
            drop_notification: false,
            response_delay_ms: 0,
        }
    }
}

/// A simulated modem that plays the device side of capability
/// transactions and device state policy
#[derive(Debug)]
pub struct VirtualModem {
    /// Phone slot this modem serves
    phone_id: PhoneId,
    /// Logical modem identity
    modem_id: ModemId,
    /// Everything the hardware claims to support
    supported: RadioAccessFamily,
    /// Capability currently live
    capability: RadioAccessFamily,
    /// Radio power state
    radio_state: RadioState,
    /// Failure behavior
    config: VirtualModemConfig,

    // Device state as last pushed by the policy layer
    indication_filter: IndicationFilter,
    cell_info_min_interval_ms: Option<u32>,
    charging: Option<bool>,
    low_data_expected: Option<bool>,
    power_save: Option<bool>,
    link_criteria: Vec<AccessNetwork>,
    barring_pulls: u32,

    /// Pending responses toward the coordination layer
    pending_output: VecDeque<ModemResponse>,
}

impl VirtualModem {
    /// Create a well-behaved virtual modem
    pub fn new(
        phone_id: PhoneId,
        modem_id: ModemId,
        supported: RadioAccessFamily,
        capability: RadioAccessFamily,
    ) -> Self {
        Self::with_config(
            phone_id,
            modem_id,
            supported,
            capability,
            VirtualModemConfig::default(),
        )
    }

    /// Create with specific failure behavior
    pub fn with_config(
        phone_id: PhoneId,
        modem_id: ModemId,
        supported: RadioAccessFamily,
        capability: RadioAccessFamily,
        config: VirtualModemConfig,
    ) -> Self {
        Self {
            phone_id,
            modem_id,
            supported,
            capability,
            radio_state: RadioState::Unavailable,
            config,
            indication_filter: IndicationFilter::ALL,
            cell_info_min_interval_ms: None,
            charging: None,
            low_data_expected: None,
            power_save: None,
            link_criteria: Vec::new(),
            barring_pulls: 0,
            pending_output: VecDeque::new(),
        }
    }

    /// Phone slot this modem serves
    pub fn phone_id(&self) -> PhoneId {
        self.phone_id
    }

    /// Logical modem identity
    pub fn modem_id(&self) -> &ModemId {
        &self.modem_id
    }

    /// Everything the hardware claims to support
    pub fn supported(&self) -> RadioAccessFamily {
        self.supported
    }

    /// Capability currently live on this modem
    pub fn capability(&self) -> RadioAccessFamily {
        self.capability
    }

    /// Radio power state
    pub fn radio_state(&self) -> RadioState {
        self.radio_state
    }

    /// The failure behavior
    pub fn config(&self) -> &VirtualModemConfig {
        &self.config
    }

    /// Change the failure behavior mid-run
    pub fn config_mut(&mut self) -> &mut VirtualModemConfig {
        &mut self.config
    }

    /// Indication filter last pushed down
    pub fn indication_filter(&self) -> IndicationFilter {
        self.indication_filter
    }

    /// Cell info interval last pushed down, if any
    pub fn cell_info_min_interval_ms(&self) -> Option<u32> {
        self.cell_info_min_interval_ms
    }

    /// Charging state last pushed down, if any
    pub fn charging(&self) -> Option<bool> {
        self.charging
    }

    /// Low data expectation last pushed down, if any
    pub fn low_data_expected(&self) -> Option<bool> {
        self.low_data_expected
    }

    /// Power save state last pushed down, if any
    pub fn power_save(&self) -> Option<bool> {
        self.power_save
    }

    /// Networks link capacity criteria were configured for, in order
    pub fn link_criteria(&self) -> &[AccessNetwork] {
        &self.link_criteria
    }

    /// How many barring info snapshots were pulled
    pub fn barring_pulls(&self) -> u32 {
        self.barring_pulls
    }

    /// Process one request from the coordination layer, queueing any
    /// responses
    pub fn handle_request(&mut self, request: ModemRequest) {
        match request {
            ModemRequest::SetCapability { cap } => self.handle_capability(cap),
            ModemRequest::SendDeviceState { kind, enabled } => {
                debug!(modem = %self.modem_id, kind = kind.name(), enabled, "device state");
                match kind {
                    DeviceStateKind::Charging => self.charging = Some(enabled),
                    DeviceStateKind::LowDataExpected => self.low_data_expected = Some(enabled),
                    DeviceStateKind::PowerSave => self.power_save = Some(enabled),
                }
            }
            ModemRequest::SetIndicationFilter { filter } => {
                debug!(modem = %self.modem_id, %filter, "indication filter");
                self.indication_filter = filter;
            }
            ModemRequest::SetCellInfoMinInterval { interval_ms } => {
                self.cell_info_min_interval_ms = Some(interval_ms);
            }
            ModemRequest::SetLinkCapacityCriteria { network, .. } => {
                self.link_criteria.push(network);
            }
            ModemRequest::GetBarringInfo => {
                self.barring_pulls += 1;
            }
        }
    }

    fn handle_capability(&mut self, cap: RadioCapability) {
        debug!(
            modem = %self.modem_id,
            phase = cap.phase.name(),
            raf = %cap.raf,
            "capability request"
        );
        match cap.phase {
            CapabilityPhase::Start => {
                if self.config.drop_start_ack {
                    debug!(modem = %self.modem_id, "configured to drop the START ack");
                    return;
                }
                let error = if self.config.fail_start {
                    Some(self.config.start_error)
                } else {
                    None
                };
                self.push_ack(cap, error);
            }

            CapabilityPhase::Apply => {
                let error = if self.config.fail_apply {
                    Some(ModemError::ModemInternal)
                } else {
                    None
                };
                self.push_ack(cap.clone(), error);

                if self.config.drop_notification {
                    debug!(modem = %self.modem_id, "configured to drop the notification");
                    return;
                }
                let status = if self.config.fail_notification {
                    CapabilityStatus::Fail
                } else {
                    // The applied family is live from here on
                    self.capability = cap.raf;
                    CapabilityStatus::Success
                };
                let unsol = RadioCapability {
                    phase: CapabilityPhase::UnsolResponse,
                    status,
                    ..cap
                };
                self.pending_output.push_back(ModemResponse::CapabilityChanged {
                    phone_id: self.phone_id,
                    cap: unsol,
                    error: None,
                });
            }

            CapabilityPhase::Finish => {
                if cap.status == CapabilityStatus::Fail {
                    // The exchange fell through; back to the family
                    // the coordinator says we had
                    self.capability = cap.raf;
                }
                self.push_ack(cap, None);
            }

            other => {
                warn!(modem = %self.modem_id, phase = other.name(), "unexpected phase");
            }
        }
    }

    /// Change the radio power state, queueing a notification when it
    /// actually moves
    pub fn set_radio_state(&mut self, state: RadioState) {
        if self.radio_state != state {
            self.radio_state = state;
            self.pending_output.push_back(ModemResponse::RadioStateChanged {
                phone_id: self.phone_id,
                state,
            });
        }
    }

    /// Take the next pending response
    pub fn take_output(&mut self) -> Option<ModemResponse> {
        self.pending_output.pop_front()
    }

    /// Check if there are pending responses
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    /// Number of pending responses
    pub fn output_count(&self) -> usize {
        self.pending_output.len()
    }

    /// Drop all pending responses
    pub fn clear_output(&mut self) {
        self.pending_output.clear();
    }

    fn push_ack(&mut self, cap: RadioCapability, error: Option<ModemError>) {
        self.pending_output.push_back(ModemResponse::CapabilityAck {
            phone_id: self.phone_id,
            cap,
            error,
        });
    }
}
