//! Daemon settings

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use xbar_policy::PolicyConfig;
use xbar_ril::{ParseError, RadioAccessFamily};
use xbar_sim::VirtualModemConfig;

/// One phone slot to bring up at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneSettings {
    /// Everything the phone's modem supports, e.g. "GSM|UMTS|LTE"
    pub supported: String,
    /// Capability the phone starts on (defaults to everything supported)
    #[serde(default)]
    pub capability: Option<String>,
    /// Failure knobs for the virtual modem backing this phone
    #[serde(default)]
    pub modem: VirtualModemConfig,
}

impl PhoneSettings {
    /// Parse the supported mask
    pub fn supported_raf(&self) -> Result<RadioAccessFamily, ParseError> {
        self.supported.parse()
    }

    /// Parse the starting capability
    pub fn capability_raf(&self) -> Result<RadioAccessFamily, ParseError> {
        match &self.capability {
            Some(s) => s.parse(),
            None => self.supported.parse(),
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Phones to bring up, one virtual modem each
    #[serde(default = "default_phones")]
    pub phones: Vec<PhoneSettings>,
    /// How long a capability transaction may run before it is failed (ms)
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
    /// Seed state for the device state policy
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_transaction_timeout_ms() -> u64 {
    45_000
}

fn all_technologies() -> String {
    "GSM|GPRS|EDGE|UMTS|HSDPA|HSUPA|HSPA|HSPAP|LTE|LTE_CA|NR".to_string()
}

/// Two phones on fully capable modems, one parked on 4G/5G and one on
/// 2G, so a swap actually moves something.
fn default_phones() -> Vec<PhoneSettings> {
    vec![
        PhoneSettings {
            supported: all_technologies(),
            capability: Some("LTE|LTE_CA|NR".to_string()),
            modem: VirtualModemConfig::default(),
        },
        PhoneSettings {
            supported: all_technologies(),
            capability: Some("GSM|GPRS|EDGE".to_string()),
            modem: VirtualModemConfig::default(),
        },
    ]
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            phones: default_phones(),
            transaction_timeout_ms: default_transaction_timeout_ms(),
            policy: PolicyConfig::default(),
        }
    }
}

impl DaemonSettings {
    /// Get the settings file path
    /// Uses $CROSSBAR_CONFIG if set, falls back to ./crossbar.json
    fn settings_path() -> PathBuf {
        std::env::var("CROSSBAR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("crossbar.json"))
    }

    /// Load settings from disk. A missing file falls back to defaults;
    /// a file that exists but does not parse is an error.
    pub fn load() -> anyhow::Result<DaemonSettings> {
        let path = Self::settings_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("malformed settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DaemonSettings::default()),
            Err(e) => Err(e).with_context(|| format!("reading settings file {}", path.display())),
        }
    }
}
