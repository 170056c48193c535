//! Inclusive ranges of TCP ports, as they appear in policy rules.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PolicyError;

/// The port value that means "we don't know the port yet".
///
/// A query for this port asks whether a relay could exit to _some_ port,
/// so a rule that covers only part of the port space is treated as a
/// possible match rather than a definite one.
pub const ANY_PORT: u16 = 0;

/// A range of port values, inclusive at both ends.
///
/// A single port is represented by a range whose low and high ends are the
/// same.  The range `*` covers every port, including [`ANY_PORT`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    /// The first port in this range.
    lo: u16,
    /// The last port in this range.
    hi: u16,
}

impl PortRange {
    /// A range that contains every port.
    pub const ALL: PortRange = PortRange { lo: 0, hi: 65535 };

    /// Create a new port range spanning from `lo` to `hi`.
    ///
    /// Return `None` if the ends are out of order.
    pub fn new(lo: u16, hi: u16) -> Option<Self> {
        (lo <= hi).then_some(PortRange { lo, hi })
    }

    /// Create a range that holds exactly one port.
    pub fn single(port: u16) -> Self {
        PortRange { lo: port, hi: port }
    }

    /// Return the lowest port in this range.
    pub fn lo(&self) -> u16 {
        self.lo
    }

    /// Return the highest port in this range.
    pub fn hi(&self) -> u16 {
        self.hi
    }

    /// Return true if `port` is inside this range.
    pub fn contains(&self, port: u16) -> bool {
        self.lo <= port && port <= self.hi
    }

    /// Return true if this range contains every port.
    pub fn is_all(&self) -> bool {
        *self == Self::ALL
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_all() {
            write!(f, "*")
        } else if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

impl FromStr for PortRange {
    type Err = PolicyError;
    fn from_str(s: &str) -> Result<Self, PolicyError> {
        if s == "*" {
            return Ok(Self::ALL);
        }
        let port = |p: &str| p.parse::<u16>().map_err(|_| PolicyError::InvalidPort);
        match s.split_once('-') {
            Some((lo, hi)) => {
                PortRange::new(port(lo)?, port(hi)?).ok_or(PolicyError::InvalidRange)
            }
            None => Ok(PortRange::single(port(s)?)),
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = PolicyError;
    fn try_from(s: String) -> Result<Self, PolicyError> {
        s.parse()
    }
}

impl From<PortRange> for String {
    fn from(r: PortRange) -> String {
        r.to_string()
    }
}

#[cfg(test)]
mod test {
    // @@ begin test lint list maintained by maint/add_warning @@
    #![allow(clippy::bool_assert_comparison)]
    #![allow(clippy::clone_on_copy)]
    #![allow(clippy::dbg_macro)]
    #![allow(clippy::mixed_attributes_style)]
    #![allow(clippy::print_stderr)]
    #![allow(clippy::print_stdout)]
    #![allow(clippy::single_char_pattern)]
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::unchecked_duration_subtraction)]
    #![allow(clippy::useless_vec)]
    #![allow(clippy::needless_pass_by_value)]
    //! <!-- @@ end test lint list maintained by maint/add_warning @@ -->
    use super::*;

    #[test]
    fn parse_and_display() {
        let r: PortRange = "80".parse().unwrap();
        assert_eq!(r, PortRange::single(80));
        assert_eq!(r.to_string(), "80");

        let r: PortRange = "1-1023".parse().unwrap();
        assert_eq!((r.lo(), r.hi()), (1, 1023));
        assert_eq!(r.to_string(), "1-1023");

        let r: PortRange = "*".parse().unwrap();
        assert!(r.is_all());
        assert_eq!(r.to_string(), "*");
        assert_eq!("0-65535".parse::<PortRange>().unwrap().to_string(), "*");
    }

    #[test]
    fn bad_ranges() {
        assert_eq!("".parse::<PortRange>(), Err(PolicyError::InvalidPort));
        assert_eq!("x".parse::<PortRange>(), Err(PolicyError::InvalidPort));
        assert_eq!("65536".parse::<PortRange>(), Err(PolicyError::InvalidPort));
        assert_eq!("1-".parse::<PortRange>(), Err(PolicyError::InvalidPort));
        assert_eq!("90-80".parse::<PortRange>(), Err(PolicyError::InvalidRange));
    }

    #[test]
    fn contains() {
        let r = PortRange::new(20, 22).unwrap();
        assert!(!r.contains(19));
        assert!(r.contains(20));
        assert!(r.contains(22));
        assert!(!r.contains(23));
        assert!(!r.contains(ANY_PORT));
        assert!(PortRange::ALL.contains(ANY_PORT));
        assert!(PortRange::new(5, 4).is_none());
    }

    #[test]
    fn serde() {
        let r: PortRange = serde_json::from_str("\"443-445\"").unwrap();
        assert_eq!(r, PortRange::new(443, 445).unwrap());
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"443-445\"");
        assert!(serde_json::from_str::<PortRange>("\"nope\"").is_err());
    }
}
