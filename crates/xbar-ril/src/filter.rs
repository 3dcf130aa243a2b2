//! Unsolicited indication filter bits.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Bitmask of unsolicited indications a modem is allowed to send.
///
/// The policy engine computes one of these from device state and
/// pushes it down whenever it changes; every cleared bit is an
/// indication the modem suppresses (and the host never wakes for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct IndicationFilter(pub u32);

impl IndicationFilter {
    pub const NONE: IndicationFilter = IndicationFilter(0);

    pub const SIGNAL_STRENGTH: IndicationFilter = IndicationFilter(0x01);
    pub const FULL_NETWORK_STATE: IndicationFilter = IndicationFilter(0x02);
    pub const DATA_CALL_DORMANCY: IndicationFilter = IndicationFilter(0x04);
    pub const LINK_CAPACITY_ESTIMATE: IndicationFilter = IndicationFilter(0x08);
    pub const PHYSICAL_CHANNEL_CONFIG: IndicationFilter = IndicationFilter(0x10);
    pub const REGISTRATION_FAILURE: IndicationFilter = IndicationFilter(0x20);
    pub const BARRING_INFO: IndicationFilter = IndicationFilter(0x40);

    /// Every indication enabled.
    pub const ALL: IndicationFilter = IndicationFilter(0x7f);

    const NAMED_BITS: [(IndicationFilter, &'static str); 7] = [
        (Self::SIGNAL_STRENGTH, "SIGNAL_STRENGTH"),
        (Self::FULL_NETWORK_STATE, "FULL_NETWORK_STATE"),
        (Self::DATA_CALL_DORMANCY, "DATA_CALL_DORMANCY"),
        (Self::LINK_CAPACITY_ESTIMATE, "LINK_CAPACITY_ESTIMATE"),
        (Self::PHYSICAL_CHANNEL_CONFIG, "PHYSICAL_CHANNEL_CONFIG"),
        (Self::REGISTRATION_FAILURE, "REGISTRATION_FAILURE"),
        (Self::BARRING_INFO, "BARRING_INFO"),
    ];

    pub fn contains(&self, other: IndicationFilter) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl BitOr for IndicationFilter {
    type Output = IndicationFilter;

    fn bitor(self, rhs: IndicationFilter) -> IndicationFilter {
        IndicationFilter(self.0 | rhs.0)
    }
}

impl BitOrAssign for IndicationFilter {
    fn bitor_assign(&mut self, rhs: IndicationFilter) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for IndicationFilter {
    type Output = IndicationFilter;

    fn bitand(self, rhs: IndicationFilter) -> IndicationFilter {
        IndicationFilter(self.0 & rhs.0)
    }
}

impl Not for IndicationFilter {
    type Output = IndicationFilter;

    fn not(self) -> IndicationFilter {
        IndicationFilter(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for IndicationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (bit, name) in Self::NAMED_BITS {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_union_of_named_bits() {
        let mut union = IndicationFilter::NONE;
        for (bit, _) in IndicationFilter::NAMED_BITS {
            union |= bit;
        }
        assert_eq!(union, IndicationFilter::ALL);
    }

    #[test]
    fn test_not_stays_within_named_space() {
        let inverted = !IndicationFilter::SIGNAL_STRENGTH;
        assert!(!inverted.contains(IndicationFilter::SIGNAL_STRENGTH));
        assert!(inverted.contains(IndicationFilter::BARRING_INFO));
        assert_eq!(!IndicationFilter::ALL, IndicationFilter::NONE);
    }

    #[test]
    fn test_display_lists_enabled_bits() {
        let filter = IndicationFilter::SIGNAL_STRENGTH | IndicationFilter::BARRING_INFO;
        assert_eq!(filter.to_string(), "SIGNAL_STRENGTH|BARRING_INFO");
        assert_eq!(IndicationFilter::NONE.to_string(), "NONE");
    }
}
