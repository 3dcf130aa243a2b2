//! Virtual Modem Simulation Library
//!
//! This crate provides a simulation layer for exercising capability
//! transactions and device state policy without vendor modem hardware.
//! It includes:
//!
//! - **VirtualModem**: Answers transaction phases, applies capability
//!   changes, records pushed device state, with scriptable failures
//! - **run_virtual_modem_task**: Async pump wiring a modem to the
//!   coordinator's channels
//!
//! # Example
//!
//! ```rust
//! use xbar_sim::VirtualModem;
//! use xbar_ril::{
//!     CapabilityPhase, CapabilityStatus, ModemId, ModemRequest, PhoneId, RadioAccessFamily,
//!     RadioCapability, SessionId,
//! };
//!
//! let mut modem = VirtualModem::new(
//!     PhoneId(0),
//!     ModemId::new("modem0"),
//!     RadioAccessFamily::GROUP_2G | RadioAccessFamily::GROUP_4G,
//!     RadioAccessFamily::GROUP_4G,
//! );
//!
//! // Feed it a transaction phase
//! modem.handle_request(ModemRequest::SetCapability {
//!     cap: RadioCapability {
//!         phone_id: PhoneId(0),
//!         session: SessionId(1),
//!         phase: CapabilityPhase::Start,
//!         raf: RadioAccessFamily::GSM,
//!         modem_id: ModemId::new("modem0"),
//!         status: CapabilityStatus::None,
//!     },
//! });
//!
//! // Collect what it answers
//! while let Some(response) = modem.take_output() {
//!     println!("modem response: {response:?}");
//! }
//! ```

pub mod modem;
pub mod modem_task;

pub use modem::{VirtualModem, VirtualModemConfig};
pub use modem_task::run_virtual_modem_task;
