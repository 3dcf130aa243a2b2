//! Modem link types for coordinator connections
//!
//! This module defines the metadata and channel structures for
//! connecting modems to the coordinator. Vendor RIL-backed and
//! virtual modems use the same types.

use tokio::sync::mpsc;
use xbar_ril::ModemRequest;

/// Type of modem connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModemType {
    /// A real modem behind a vendor RIL
    Vendor,
    /// Virtual/simulated modem
    Virtual,
}

/// Metadata for a connected modem link
#[derive(Debug, Clone)]
pub struct ModemLinkMeta {
    /// Whether this is a vendor or virtual modem
    pub modem_type: ModemType,
    /// Human-readable display name
    pub display_name: String,
    /// Simulation ID (for virtual modems)
    pub sim_id: Option<String>,
}

impl ModemLinkMeta {
    /// Create metadata for a vendor modem
    pub fn new_vendor(display_name: String) -> Self {
        Self {
            modem_type: ModemType::Vendor,
            display_name,
            sim_id: None,
        }
    }

    /// Create metadata for a virtual modem
    pub fn new_virtual(display_name: String, sim_id: String) -> Self {
        Self {
            modem_type: ModemType::Virtual,
            display_name,
            sim_id: Some(sim_id),
        }
    }

    /// Check if this is a virtual/simulated modem
    pub fn is_simulated(&self) -> bool {
        self.modem_type == ModemType::Virtual
    }
}

/// The coordinator's outbound side of one modem connection.
pub struct ModemLink {
    /// Metadata about this modem
    pub meta: ModemLinkMeta,
    /// Sender for requests to this modem's task
    pub request_tx: mpsc::Sender<ModemRequest>,
}

impl std::fmt::Debug for ModemLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModemLink")
            .field("meta", &self.meta)
            .field("request_tx", &"<sender>")
            .finish()
    }
}

impl ModemLink {
    /// Create a new modem link with the given metadata and sender
    pub fn new(meta: ModemLinkMeta, request_tx: mpsc::Sender<ModemRequest>) -> Self {
        Self { meta, request_tx }
    }
}
