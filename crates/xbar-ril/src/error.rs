//! Error types shared across the coordination layer.

use thiserror::Error;

/// Errors a modem can report for a request.
///
/// `RadioNotAvailable` is also synthesized locally when a modem link
/// is down, so callers see one uniform failure shape whether the
/// modem answered with an error or never heard the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModemError {
    #[error("radio not available")]
    RadioNotAvailable,

    #[error("request not supported")]
    RequestNotSupported,

    #[error("invalid arguments")]
    InvalidArguments,

    #[error("modem internal error")]
    ModemInternal,
}

/// Errors from parsing the textual forms of shared types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown radio technology: {name:?}")]
    UnknownTechnology { name: String },
}
