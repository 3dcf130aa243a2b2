//! Typed Observer Lists
//!
//! This crate provides the subscription primitives the coordination
//! layer hangs its notifications on:
//!
//! - [`Fanout`]: an ordered observer list delivering cloned values
//!   over unbounded channels, pruning subscribers whose receiving end
//!   has gone away. Re-registering an id moves it to the end of the
//!   delivery order instead of duplicating it.
//! - [`SingleSlot`]: the at-most-one-subscriber variant, with
//!   id-checked clearing so a stale clear cannot evict a newer
//!   registration.
//! - [`RadioStateWatch`]: a radio power state plus five conditional
//!   lists (state changed, on, available, not available, off or not
//!   available), each firing immediately at registration when its
//!   condition already holds.
//!
//! # Example
//!
//! ```rust
//! use xbar_fanout::{Fanout, SubscriberId};
//! use tokio::sync::mpsc;
//!
//! let mut fanout = Fanout::new();
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! fanout.subscribe(SubscriberId(1), tx);
//! assert_eq!(fanout.notify("hello"), 1);
//! assert_eq!(rx.try_recv().unwrap(), "hello");
//! ```

pub mod radio_watch;
pub mod registry;

pub use radio_watch::RadioStateWatch;
pub use registry::{Fanout, SingleSlot, SubscriberId};
