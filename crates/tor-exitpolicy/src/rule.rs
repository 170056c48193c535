//! Individual accept/reject clauses of an exit policy.

use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ANY_PORT, PolicyError, PortRange};

/// What a policy rule does with the targets that it matches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
pub enum RuleKind {
    /// The relay will exit to matching targets.
    Accept,
    /// The relay refuses to exit to matching targets.
    Reject,
}

impl RuleKind {
    /// Return the keyword used for this kind of rule in a policy.
    pub fn keyword(&self) -> &'static str {
        match self {
            RuleKind::Accept => "accept",
            RuleKind::Reject => "reject",
        }
    }
}

/// A single firewall-style clause in an [`ExitPolicy`](crate::ExitPolicy).
///
/// A rule covers every IPv4 address whose masked value equals the rule's
/// masked address, on every port in the rule's [`PortRange`].  A mask of
/// zero covers every address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyRule {
    /// Whether this rule accepts or rejects.
    kind: RuleKind,
    /// The network address that this rule applies to.
    addr: Ipv4Addr,
    /// Mask to apply to both the rule's address and the target address.
    mask: u32,
    /// The ports that this rule applies to.
    ports: PortRange,
}

/// How well a target fits a single rule, given what we know about it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RuleMatch {
    /// The rule applies to the target.
    Definite,
    /// The rule might apply to the target; the part we don't know decides.
    Possible,
    /// The rule can't apply to the target.
    No,
}

impl PolicyRule {
    /// Construct a rule that applies to `addr` under `mask`, on `ports`.
    pub fn new(kind: RuleKind, addr: Ipv4Addr, mask: Ipv4Addr, ports: PortRange) -> Self {
        PolicyRule {
            kind,
            addr,
            mask: mask.to_bits(),
            ports,
        }
    }

    /// Construct a rule that applies to every address in `addr/prefix_len`.
    ///
    /// Return `None` if `prefix_len` is greater than 32.
    pub fn with_prefix(
        kind: RuleKind,
        addr: Ipv4Addr,
        prefix_len: u8,
        ports: PortRange,
    ) -> Option<Self> {
        let mask = prefix_to_mask(prefix_len)?;
        Some(PolicyRule {
            kind,
            addr,
            mask,
            ports,
        })
    }

    /// Construct a rule that applies to every address on `ports`.
    pub fn any_addr(kind: RuleKind, ports: PortRange) -> Self {
        PolicyRule {
            kind,
            addr: Ipv4Addr::UNSPECIFIED,
            mask: 0,
            ports,
        }
    }

    /// Return whether this rule accepts or rejects.
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Return the address of the network this rule covers.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// Return the mask for the network this rule covers.
    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.mask)
    }

    /// Return the range of ports that this rule covers.
    pub fn ports(&self) -> PortRange {
        self.ports
    }

    /// Return true if this rule covers every address.
    pub fn is_any_addr(&self) -> bool {
        self.mask == 0
    }

    /// Return true if `addr` is inside the network this rule covers.
    pub fn covers_addr(&self, addr: Ipv4Addr) -> bool {
        (addr.to_bits() & self.mask) == (self.addr.to_bits() & self.mask)
    }

    /// Decide whether a target matches this rule.
    ///
    /// `addr` is `None` if we don't know the target address, and `port` is
    /// [`ANY_PORT`] if we don't know the target port.
    pub(crate) fn match_target(&self, addr: Option<Ipv4Addr>, port: u16) -> RuleMatch {
        let port_in_range = self.ports.contains(port);
        match addr {
            None if port_in_range => {
                if self.is_any_addr() {
                    RuleMatch::Definite
                } else {
                    RuleMatch::Possible
                }
            }
            None if port == ANY_PORT => RuleMatch::Possible,
            None => RuleMatch::No,
            Some(a) if self.covers_addr(a) => {
                if port_in_range {
                    RuleMatch::Definite
                } else if port == ANY_PORT {
                    RuleMatch::Possible
                } else {
                    RuleMatch::No
                }
            }
            Some(_) => RuleMatch::No,
        }
    }
}

/// Convert a prefix length into a netmask.
fn prefix_to_mask(prefix_len: u8) -> Option<u32> {
    match prefix_len {
        0 => Some(0),
        1..=32 => Some(u32::MAX << (32 - u32::from(prefix_len))),
        _ => None,
    }
}

/// Parse the mask part of `ADDR/MASK`.
fn parse_mask(s: &str) -> Result<u32, PolicyError> {
    if s.contains('.') {
        let m: Ipv4Addr = s.parse().map_err(|_| PolicyError::InvalidMask)?;
        Ok(m.to_bits())
    } else {
        let bits: u8 = s.parse().map_err(|_| PolicyError::InvalidMask)?;
        prefix_to_mask(bits).ok_or(PolicyError::InvalidMask)
    }
}

impl Display for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.kind.keyword())?;
        if self.is_any_addr() {
            write!(f, "*")?;
        } else if self.mask.leading_ones() + self.mask.trailing_zeros() == 32 {
            write!(f, "{}/{}", self.addr, self.mask.leading_ones())?;
        } else {
            write!(f, "{}/{}", self.addr, self.mask())?;
        }
        write!(f, ":{}", self.ports)
    }
}

impl FromStr for PolicyRule {
    type Err = PolicyError;
    fn from_str(s: &str) -> Result<Self, PolicyError> {
        let mut words = s.split_ascii_whitespace();
        let kind = match words.next() {
            Some("accept") => RuleKind::Accept,
            Some("reject") => RuleKind::Reject,
            _ => return Err(PolicyError::InvalidPolicy),
        };
        let pattern = words.next().ok_or(PolicyError::InvalidPolicy)?;
        if words.next().is_some() {
            return Err(PolicyError::InvalidPolicy);
        }

        let (addr_part, port_part) = pattern
            .rsplit_once(':')
            .ok_or(PolicyError::InvalidPolicy)?;
        let ports = port_part.parse()?;
        if addr_part == "*" {
            return Ok(PolicyRule::any_addr(kind, ports));
        }
        let (addr, mask) = match addr_part.split_once('/') {
            Some((a, m)) => (a, parse_mask(m)?),
            None => (addr_part, u32::MAX),
        };
        let addr = addr.parse().map_err(|_| PolicyError::InvalidAddress)?;
        Ok(PolicyRule {
            kind,
            addr,
            mask,
            ports,
        })
    }
}

impl TryFrom<String> for PolicyRule {
    type Error = PolicyError;
    fn try_from(s: String) -> Result<Self, PolicyError> {
        s.parse()
    }
}

impl From<PolicyRule> for String {
    fn from(r: PolicyRule) -> String {
        r.to_string()
    }
}
