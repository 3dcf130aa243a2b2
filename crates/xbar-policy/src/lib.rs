//! Device State Policy Engine
//!
//! This crate decides what a modem is allowed to report based on what
//! the device is doing. A lit screen, a charger, tethering, or a car
//! display mean someone cares about radio state right now; without
//! them, every unsolicited indication is a wakeup nobody asked for.
//!
//! The policy folds those inputs into three outputs per phone:
//!
//! - An **indication filter**: which unsolicited reports stay enabled
//! - A **cell info interval**: how often cell updates may arrive
//! - A **low data expectation**: whether the modem may batch work
//!
//! # Example
//!
//! ```rust,no_run
//! use xbar_policy::{DeviceStatePolicy, DeviceStateEvent};
//!
//! let mut policy = DeviceStatePolicy::new();
//!
//! // The screen went dark
//! policy.update(DeviceStateEvent::ScreenChanged(false));
//!
//! // Forward the decided requests to the modem
//! for request in policy.drain_requests() {
//!     // modem_tx.send(request)
//! }
//! ```

pub mod actor;
pub mod engine;

// Re-export actor types
pub use actor::{run_policy_actor, PolicyActorCommand};

// Re-export engine types
pub use engine::{
    DeviceStateEvent, DeviceStatePolicy, NrTrackingMode, PolicyConfig, PolicyEvent,
    CELL_INFO_INTERVAL_LONG_MS, CELL_INFO_INTERVAL_SHORT_MS,
};
