//! Coordinator error types

use thiserror::Error;

/// Errors returned when a capability request cannot be accepted.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// The request must name exactly one capability per phone.
    #[error("capability count mismatch: expected {expected}, got {got}")]
    PhoneCountMismatch { expected: usize, got: usize },

    /// Another transaction is in flight. Requests are rejected, never
    /// queued; callers retry after the current one resolves.
    #[error("capability transaction already in progress")]
    TransactionInProgress,
}
