//! Radio Capability Switch Coordinator
//!
//! This crate provides the core coordination logic for moving radio
//! access capabilities between the phones of a multi-SIM device. All
//! phones share one pool of modem capability; handing LTE from one
//! phone to another has to happen on every modem at once or on none.
//!
//! # Architecture
//!
//! The coordinator drives a three-phase transaction across all phones:
//!
//! - **START**: every modem confirms it can take part
//! - **APPLY**: every modem switches to its new capability and reports
//!   the result as an unsolicited notification
//! - **FINISH**: every modem commits (or abandons) the exchange
//!
//! A session number stamps each transaction; late replies from an
//! abandoned session are discarded. When any phone fails, the
//! coordinator finishes the exchange with the old capabilities so that
//! no phone is left half-switched.
//!
//! # Channel-Based Architecture
//!
//! The coordinator runs as an actor where:
//! - Each phone's modem has a `ModemLink` carrying requests to it
//! - Replies and notifications come back as `SwitchActorCommand`s
//! - All progress (phase changes, terminal outcomes) emits through a
//!   unified `SwitchEvent` stream
//!
//! # Example
//!
//! ```rust,no_run
//! use xbar_switch::{CapabilityCoordinator, PhoneDescriptor};
//! use xbar_ril::{ModemId, RadioAccessFamily};
//!
//! let mut coordinator = CapabilityCoordinator::new();
//!
//! // Attach phones
//! coordinator.add_phone(PhoneDescriptor {
//!     capability: RadioAccessFamily::GROUP_4G,
//!     supported: RadioAccessFamily::GROUP_2G | RadioAccessFamily::GROUP_4G,
//!     modem_id: ModemId::new("modem0"),
//! });
//! coordinator.add_phone(PhoneDescriptor {
//!     capability: RadioAccessFamily::GSM,
//!     supported: RadioAccessFamily::GROUP_2G | RadioAccessFamily::GROUP_4G,
//!     modem_id: ModemId::new("modem1"),
//! });
//!
//! // Swap the two capabilities
//! coordinator
//!     .set_capability(&[RadioAccessFamily::GSM, RadioAccessFamily::GROUP_4G])
//!     .unwrap();
//!
//! // Forward coordinator.drain_requests() to the modems and feed
//! // their replies to coordinator.process_modem_response(..)
//! ```

pub mod actor;
pub mod engine;
pub mod error;
pub mod events;
pub mod link;
pub mod multisim;
pub mod state;

// Re-export actor types
pub use actor::{
    run_switch_actor, ModemRegistration, PhoneSummary, StateWatch, SwitchActorCommand,
};

// Re-export link types
pub use link::{ModemLink, ModemLinkMeta, ModemType};

// Re-export event types
pub use events::SwitchEvent;

// Re-export engine types
pub use engine::{CapabilityCoordinator, CoordinatorConfig, SetOutcome};
pub use error::SwitchError;
pub use multisim::MultiSimNotifier;
pub use state::{KeepAliveGuard, PhoneDescriptor, PhoneSlot, SlotStatus};
