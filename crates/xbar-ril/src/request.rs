//! Request and response shapes between the coordination layer and a
//! modem.
//!
//! The direction matters: [`ModemRequest`] flows down to a modem,
//! [`ModemResponse`] flows back up. Responses cover both solicited
//! acks and unsolicited notifications; the capability engine tells
//! them apart by the embedded phase.

use crate::capability::{PhoneId, RadioCapability, RadioState};
use crate::error::ModemError;
use crate::filter::IndicationFilter;

/// Device state dimensions a modem is told about so it can batch or
/// defer work while the host is dozing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceStateKind {
    Charging,
    LowDataExpected,
    PowerSave,
}

impl DeviceStateKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceStateKind::Charging => "CHARGING",
            DeviceStateKind::LowDataExpected => "LOW_DATA_EXPECTED",
            DeviceStateKind::PowerSave => "POWER_SAVE",
        }
    }
}

/// Radio access network a reporting criteria request applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessNetwork {
    Geran,
    Utran,
    Eutran,
    Cdma2000,
    Ngran,
}

impl AccessNetwork {
    /// Every network the reset sequence configures.
    pub const ALL: [AccessNetwork; 5] = [
        AccessNetwork::Geran,
        AccessNetwork::Utran,
        AccessNetwork::Eutran,
        AccessNetwork::Cdma2000,
        AccessNetwork::Ngran,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AccessNetwork::Geran => "GERAN",
            AccessNetwork::Utran => "UTRAN",
            AccessNetwork::Eutran => "EUTRAN",
            AccessNetwork::Cdma2000 => "CDMA2000",
            AccessNetwork::Ngran => "NGRAN",
        }
    }
}

/// A request sent down to one modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemRequest {
    /// One phase of a capability transaction. The phase and session
    /// ride inside the capability payload.
    SetCapability { cap: RadioCapability },

    /// Inform the modem of a device state change.
    SendDeviceState {
        kind: DeviceStateKind,
        enabled: bool,
    },

    /// Replace the unsolicited indication filter.
    SetIndicationFilter { filter: IndicationFilter },

    /// Minimum spacing between unsolicited cell info reports.
    SetCellInfoMinInterval { interval_ms: u32 },

    /// Hysteresis thresholds for link capacity estimate reports.
    SetLinkCapacityCriteria {
        network: AccessNetwork,
        downlink_kbps: Vec<u32>,
        uplink_kbps: Vec<u32>,
    },

    /// Pull the current barring info snapshot. Issued after barring
    /// indications were re-enabled, to recover anything missed while
    /// they were off.
    GetBarringInfo,
}

impl ModemRequest {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ModemRequest::SetCapability { .. } => "SET_CAPABILITY",
            ModemRequest::SendDeviceState { .. } => "SEND_DEVICE_STATE",
            ModemRequest::SetIndicationFilter { .. } => "SET_INDICATION_FILTER",
            ModemRequest::SetCellInfoMinInterval { .. } => "SET_CELL_INFO_MIN_INTERVAL",
            ModemRequest::SetLinkCapacityCriteria { .. } => "SET_LINK_CAPACITY_CRITERIA",
            ModemRequest::GetBarringInfo => "GET_BARRING_INFO",
        }
    }
}

/// A message from one modem back to the coordination layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemResponse {
    /// Solicited reply to a `SetCapability` request.
    CapabilityAck {
        phone_id: PhoneId,
        cap: RadioCapability,
        error: Option<ModemError>,
    },

    /// Unsolicited notification that an applied capability took
    /// effect (or failed) modem-side.
    CapabilityChanged {
        phone_id: PhoneId,
        cap: RadioCapability,
        error: Option<ModemError>,
    },

    RadioStateChanged {
        phone_id: PhoneId,
        state: RadioState,
    },
}

impl ModemResponse {
    pub fn phone_id(&self) -> PhoneId {
        match self {
            ModemResponse::CapabilityAck { phone_id, .. } => *phone_id,
            ModemResponse::CapabilityChanged { phone_id, .. } => *phone_id,
            ModemResponse::RadioStateChanged { phone_id, .. } => *phone_id,
        }
    }

    /// True for unsolicited messages a modem emits on its own.
    pub fn is_unsolicited(&self) -> bool {
        matches!(
            self,
            ModemResponse::CapabilityChanged { .. } | ModemResponse::RadioStateChanged { .. }
        )
    }
}
