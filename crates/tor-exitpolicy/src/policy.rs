//! Ordered exit policies and their three-valued evaluation.

use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rule::RuleMatch;
use crate::{ANY_PORT, PolicyError, PolicyRule, RuleKind};

/// The result of checking a target against an [`ExitPolicy`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
pub enum PolicyOutcome {
    /// The policy definitely allows the target.
    Accepted,
    /// The policy definitely refuses the target.
    Rejected,
    /// The answer depends on parts of the target that we don't know.
    Unknown,
}

/// An exit policy: an ordered list of [`PolicyRule`]s.
///
/// Rules are checked in order and the first rule that definitely matches
/// a target decides the outcome.  A target that no rule matches is
/// accepted.
///
/// # Example
///
/// ```
/// use tor_exitpolicy::{ExitPolicy, PolicyOutcome};
///
/// let policy: ExitPolicy = "reject *:25\naccept *:*".parse().unwrap();
/// assert_eq!(policy.classify(None, 25), PolicyOutcome::Rejected);
/// assert_eq!(policy.classify(None, 443), PolicyOutcome::Accepted);
/// assert!(!policy.rejects_all());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitPolicy {
    /// The rules of this policy, in evaluation order.
    rules: Vec<PolicyRule>,
}

impl ExitPolicy {
    /// Return a new policy with no rules.
    ///
    /// (An empty policy accepts everything.)
    pub fn new() -> Self {
        ExitPolicy::default()
    }

    /// Add `rule` at the end of this policy.
    pub fn push(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
    }

    /// Return an iterator over the rules of this policy, in order.
    pub fn iter(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter()
    }

    /// Return the number of rules in this policy.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Return true if this policy has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether this policy allows traffic to `addr`:`port`.
    ///
    /// If `addr` is `None`, the target address is unknown.  If `port` is
    /// [`ANY_PORT`], the target port is unknown.
    ///
    /// A rule that might match (because of what we don't know) doesn't
    /// end the scan, but it taints the result: a later definite accept
    /// becomes [`PolicyOutcome::Unknown`] if an earlier rule might have
    /// rejected, and a later definite reject becomes `Unknown` if an
    /// earlier rule might have accepted.
    pub fn classify(&self, addr: Option<Ipv4Addr>, port: u16) -> PolicyOutcome {
        let mut maybe_accept = false;
        let mut maybe_reject = false;

        for rule in &self.rules {
            match rule.match_target(addr, port) {
                RuleMatch::No => {}
                RuleMatch::Possible => match rule.kind() {
                    RuleKind::Accept => maybe_accept = true,
                    RuleKind::Reject => maybe_reject = true,
                },
                RuleMatch::Definite => {
                    debug!(
                        "Address {}:{} matches exit policy '{}'",
                        DisplayAddr(addr),
                        port,
                        rule
                    );
                    return match rule.kind() {
                        RuleKind::Accept if maybe_reject => PolicyOutcome::Unknown,
                        RuleKind::Accept => PolicyOutcome::Accepted,
                        RuleKind::Reject if maybe_accept => PolicyOutcome::Unknown,
                        RuleKind::Reject => PolicyOutcome::Rejected,
                    };
                }
            }
        }

        // Anything not mentioned is accepted.
        if maybe_reject {
            PolicyOutcome::Unknown
        } else {
            PolicyOutcome::Accepted
        }
    }

    /// Return true if this policy refuses every exit connection.
    ///
    /// This is true exactly when an unknown address on an unknown port is
    /// definitely rejected.
    pub fn rejects_all(&self) -> bool {
        self.classify(None, ANY_PORT) == PolicyOutcome::Rejected
    }
}

/// Helper: display an address that might be unknown.
struct DisplayAddr(Option<Ipv4Addr>);
impl Display for DisplayAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(a) => write!(f, "{}", a),
            None => write!(f, "[unknown]"),
        }
    }
}

impl FromIterator<PolicyRule> for ExitPolicy {
    fn from_iter<T: IntoIterator<Item = PolicyRule>>(iter: T) -> Self {
        ExitPolicy {
            rules: iter.into_iter().collect(),
        }
    }
}

impl Display for ExitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        for rule in &self.rules {
            write!(f, "{}{}", sep, rule)?;
            sep = ", ";
        }
        Ok(())
    }
}

impl FromStr for ExitPolicy {
    type Err = PolicyError;
    /// Parse a policy from a list of rules separated by commas or newlines.
    fn from_str(s: &str) -> Result<Self, PolicyError> {
        s.split(['\n', ','])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}
