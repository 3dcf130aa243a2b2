//! Radio Interface Vocabulary
//!
//! This crate provides the shared types spoken between the
//! coordination layer and the modems it manages:
//!
//! - **RadioAccessFamily**: bitmask of radio access technologies
//!   (GSM through NR), with a pipe-separated textual form
//! - **RadioCapability**: the payload of every capability transaction
//!   message (phase, session, access family, logical modem, status)
//! - **IndicationFilter**: which unsolicited indications a modem may
//!   send, as computed by the device state policy
//! - **ModemRequest / ModemResponse**: the downward and upward
//!   message shapes, covering capability phases, device state hints,
//!   filters, and reporting criteria
//!
//! The capability transaction runs in three phases per the radio
//! capability protocol: START prepares every phone under a fresh
//! session id, APPLY hands each phone its new configuration (the real
//! completion signal being an unsolicited `CapabilityChanged`), and
//! FINISH distributes the outcome so the modems commit or revert.
//!
//! # Example
//!
//! ```rust
//! use xbar_ril::RadioAccessFamily;
//!
//! let raf: RadioAccessFamily = "GSM|LTE|NR".parse().unwrap();
//! assert!(raf.contains(RadioAccessFamily::LTE));
//! assert_eq!(raf.to_string(), "GSM|LTE|NR");
//! ```

pub mod capability;
pub mod error;
pub mod filter;
pub mod raf;
pub mod request;

// Re-export capability transaction types
pub use capability::{
    CapabilityPhase, CapabilityStatus, ModemId, PhoneId, RadioCapability, RadioState, SessionId,
};
// Re-export error types
pub use error::{ModemError, ParseError};
// Re-export filter and access family bitmasks
pub use filter::IndicationFilter;
pub use raf::RadioAccessFamily;
// Re-export message shapes
pub use request::{AccessNetwork, DeviceStateKind, ModemRequest, ModemResponse};
