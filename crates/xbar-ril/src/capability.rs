//! Capability transaction vocabulary.
//!
//! A capability swap runs as a three-phase transaction (START, APPLY,
//! FINISH) against every phone at once. Each message in the protocol
//! carries a [`RadioCapability`]: the phase, the session it belongs
//! to, the access family payload, and the logical modem involved.

use std::fmt;

use crate::raf::RadioAccessFamily;

/// Logical phone slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PhoneId(pub u32);

impl PhoneId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PhoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phone{}", self.0)
    }
}

/// Transaction session identifier.
///
/// Sessions are compared for equality only; there is no ordering. The
/// counter wraps on overflow, which is fine because only the live
/// session's messages are ever acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SessionId(pub i32);

impl SessionId {
    /// The successor id, wrapping on overflow.
    pub fn next(&self) -> SessionId {
        SessionId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session={}", self.0)
    }
}

/// Logical modem identifier.
///
/// The empty string is a valid value meaning "no modem holds this
/// configuration"; it still participates in duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ModemId(pub String);

impl ModemId {
    pub fn new(id: impl Into<String>) -> ModemId {
        ModemId(id.into())
    }

    /// The "no holder" value.
    pub fn none() -> ModemId {
        ModemId(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for ModemId {
    fn from(s: &str) -> ModemId {
        ModemId(s.to_string())
    }
}

/// Phase of a capability transaction message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CapabilityPhase {
    /// Steady state outside any transaction.
    Configured,
    /// Phase 1: all phones asked to prepare for the swap.
    Start,
    /// Phase 2: all phones asked to take on their new configuration.
    Apply,
    /// Unsolicited notification that an APPLY completed modem-side.
    UnsolResponse,
    /// Phase 3: outcome distribution, commit or revert.
    Finish,
}

impl CapabilityPhase {
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityPhase::Configured => "CONFIGURED",
            CapabilityPhase::Start => "START",
            CapabilityPhase::Apply => "APPLY",
            CapabilityPhase::UnsolResponse => "UNSOL_RSP",
            CapabilityPhase::Finish => "FINISH",
        }
    }
}

/// Outcome carried by a capability message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CapabilityStatus {
    /// No outcome yet (START and APPLY requests).
    None,
    Success,
    Fail,
}

impl CapabilityStatus {
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityStatus::None => "NONE",
            CapabilityStatus::Success => "SUCCESS",
            CapabilityStatus::Fail => "FAIL",
        }
    }
}

/// One capability transaction message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioCapability {
    pub phone_id: PhoneId,
    pub session: SessionId,
    pub phase: CapabilityPhase,
    pub raf: RadioAccessFamily,
    pub modem_id: ModemId,
    pub status: CapabilityStatus,
}

impl fmt::Display for RadioCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} phase={} raf={} modem={} status={}",
            self.phone_id,
            self.session,
            self.phase.name(),
            self.raf,
            self.modem_id,
            self.status.name(),
        )
    }
}

/// Power state of a modem's radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RadioState {
    /// The modem is not responding at all.
    Unavailable,
    Off,
    On,
}

impl RadioState {
    pub fn is_on(&self) -> bool {
        matches!(self, RadioState::On)
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, RadioState::Unavailable)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RadioState::Unavailable => "UNAVAILABLE",
            RadioState::Off => "OFF",
            RadioState::On => "ON",
        }
    }
}
