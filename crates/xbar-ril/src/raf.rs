//! Radio access family bitmasks.
//!
//! A `RadioAccessFamily` describes which radio access technologies a
//! modem supports (or is being asked to take on) as a bitmask. The
//! coordination layer treats the mask as opaque apart from equality,
//! union, and bit counting; the named bits exist so configs and logs
//! can speak `"GSM|LTE|NR"` instead of hex.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::ParseError;

/// Bitmask of radio access technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RadioAccessFamily(pub u32);

impl RadioAccessFamily {
    /// No technologies; also the "unknown" value.
    pub const UNKNOWN: RadioAccessFamily = RadioAccessFamily(0);

    pub const GSM: RadioAccessFamily = RadioAccessFamily(1 << 0);
    pub const GPRS: RadioAccessFamily = RadioAccessFamily(1 << 1);
    pub const EDGE: RadioAccessFamily = RadioAccessFamily(1 << 2);
    pub const UMTS: RadioAccessFamily = RadioAccessFamily(1 << 3);
    pub const HSDPA: RadioAccessFamily = RadioAccessFamily(1 << 4);
    pub const HSUPA: RadioAccessFamily = RadioAccessFamily(1 << 5);
    pub const HSPA: RadioAccessFamily = RadioAccessFamily(1 << 6);
    pub const HSPAP: RadioAccessFamily = RadioAccessFamily(1 << 7);
    pub const LTE: RadioAccessFamily = RadioAccessFamily(1 << 8);
    pub const LTE_CA: RadioAccessFamily = RadioAccessFamily(1 << 9);
    pub const NR: RadioAccessFamily = RadioAccessFamily(1 << 10);

    /// All 2G technologies.
    pub const GROUP_2G: RadioAccessFamily =
        RadioAccessFamily(Self::GSM.0 | Self::GPRS.0 | Self::EDGE.0);
    /// All 3G technologies.
    pub const GROUP_3G: RadioAccessFamily = RadioAccessFamily(
        Self::UMTS.0 | Self::HSDPA.0 | Self::HSUPA.0 | Self::HSPA.0 | Self::HSPAP.0,
    );
    /// All 4G technologies.
    pub const GROUP_4G: RadioAccessFamily =
        RadioAccessFamily(Self::LTE.0 | Self::LTE_CA.0);
    /// All 5G technologies.
    pub const GROUP_5G: RadioAccessFamily = RadioAccessFamily(Self::NR.0);

    const NAMED_BITS: [(RadioAccessFamily, &'static str); 11] = [
        (Self::GSM, "GSM"),
        (Self::GPRS, "GPRS"),
        (Self::EDGE, "EDGE"),
        (Self::UMTS, "UMTS"),
        (Self::HSDPA, "HSDPA"),
        (Self::HSUPA, "HSUPA"),
        (Self::HSPA, "HSPA"),
        (Self::HSPAP, "HSPAP"),
        (Self::LTE, "LTE"),
        (Self::LTE_CA, "LTE_CA"),
        (Self::NR, "NR"),
    ];

    /// Returns true if every bit of `other` is set in `self`.
    pub fn contains(&self, other: RadioAccessFamily) -> bool {
        self.0 & other.0 == other.0
    }

    /// Number of set technology bits. Used to rank modems when picking
    /// the most or least capable supported configuration.
    pub fn bit_count(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl BitOr for RadioAccessFamily {
    type Output = RadioAccessFamily;

    fn bitor(self, rhs: RadioAccessFamily) -> RadioAccessFamily {
        RadioAccessFamily(self.0 | rhs.0)
    }
}

impl BitOrAssign for RadioAccessFamily {
    fn bitor_assign(&mut self, rhs: RadioAccessFamily) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RadioAccessFamily {
    type Output = RadioAccessFamily;

    fn bitand(self, rhs: RadioAccessFamily) -> RadioAccessFamily {
        RadioAccessFamily(self.0 & rhs.0)
    }
}

impl BitAndAssign for RadioAccessFamily {
    fn bitand_assign(&mut self, rhs: RadioAccessFamily) {
        self.0 &= rhs.0;
    }
}

impl fmt::Display for RadioAccessFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "UNKNOWN");
        }
        let mut first = true;
        let mut remaining = self.0;
        for (bit, name) in Self::NAMED_BITS {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
                remaining &= !bit.0;
            }
        }
        // Bits outside the named set print as hex so nothing is silently lost
        if remaining != 0 {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{remaining:#x}")?;
        }
        Ok(())
    }
}

impl FromStr for RadioAccessFamily {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("UNKNOWN") {
            return Ok(RadioAccessFamily::UNKNOWN);
        }
        let mut raf = RadioAccessFamily::UNKNOWN;
        for part in trimmed.split('|') {
            let part = part.trim();
            let bit = Self::NAMED_BITS
                .iter()
                .find(|(_, name)| name.eq_ignore_ascii_case(part))
                .map(|(bit, _)| *bit)
                .ok_or_else(|| ParseError::UnknownTechnology {
                    name: part.to_string(),
                })?;
            raf |= bit;
        }
        Ok(raf)
    }
}
