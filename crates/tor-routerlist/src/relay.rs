//! Information about a single relay.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::SystemTime;

use derive_builder::Builder;
use tor_exitpolicy::{ExitPolicy, PolicyOutcome};

use crate::names::NameQuery;
use crate::{Error, IdentityDigest, RelayKey, Result};

/// Everything we know about one relay, as taken from its most recent
/// descriptor.
///
/// A record's identity never changes.  Its nickname and hostname can change
/// whenever the relay publishes a new descriptor.
///
/// To make one, use a [`RelayRecordBuilder`].
#[derive(Clone, Debug, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "Error"))]
pub struct RelayRecord {
    /// Digest of this relay's identity key.
    identity: IdentityDigest,
    /// This relay's self-chosen nickname.
    ///
    /// Nicknames are compared without regard to ASCII case.
    #[builder(setter(into))]
    nickname: String,
    /// The hostname that this relay advertised.
    #[builder(setter(into))]
    address: String,
    /// The address that `address` resolved to, once we've looked it up.
    #[builder(default, setter(strip_option))]
    addr: Option<Ipv4Addr>,
    /// Port for onion-routing connections.
    #[builder(default)]
    or_port: u16,
    /// Port for directory connections, or 0 if this relay isn't a
    /// directory cache.
    #[builder(default)]
    dir_port: u16,
    /// The relay's long-term identity key.
    #[builder(default, setter(strip_option))]
    identity_key: Option<RelayKey>,
    /// The relay's medium-term onion key.
    #[builder(default, setter(strip_option))]
    onion_key: Option<RelayKey>,
    /// Software description that the relay advertised.
    #[builder(default, setter(into))]
    platform: String,
    /// When the descriptor for this record was published.
    published: SystemTime,
    /// Which exit targets this relay allows.
    #[builder(default, setter(custom))]
    exit_policy: Arc<ExitPolicy>,
    /// True if we believe that this relay is up.
    #[builder(default = "true")]
    is_running: bool,
    /// True if we trust this relay as an authoritative directory server.
    #[builder(default)]
    is_trusted_dir: bool,
}

impl RelayRecordBuilder {
    /// Set the exit policy for this relay.
    pub fn exit_policy(&mut self, policy: ExitPolicy) -> &mut Self {
        self.exit_policy = Some(Arc::new(policy));
        self
    }

    /// Check the rules that every relay record must follow.
    fn validate(&self) -> Result<()> {
        if self.nickname.as_deref() == Some("") {
            return Err(Error::InvalidRelay("empty nickname".into()));
        }
        if self.is_trusted_dir == Some(true) && self.dir_port.unwrap_or(0) == 0 {
            return Err(Error::InvalidRelay(
                "trusted directory without a directory port".into(),
            ));
        }
        Ok(())
    }
}

impl RelayRecord {
    /// Return a new [`RelayRecordBuilder`].
    pub fn builder() -> RelayRecordBuilder {
        RelayRecordBuilder::default()
    }

    /// Return the identity digest of this relay.
    pub fn identity(&self) -> &IdentityDigest {
        &self.identity
    }
    /// Return the nickname of this relay.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }
    /// Return the hostname that this relay advertised.
    pub fn address(&self) -> &str {
        &self.address
    }
    /// Return the resolved address of this relay, if we have one.
    pub fn addr(&self) -> Option<Ipv4Addr> {
        self.addr
    }
    /// Return this relay's onion-routing port.
    pub fn or_port(&self) -> u16 {
        self.or_port
    }
    /// Return this relay's directory port, or 0 if it has none.
    pub fn dir_port(&self) -> u16 {
        self.dir_port
    }
    /// Return this relay's identity key, if its descriptor had one.
    pub fn identity_key(&self) -> Option<&RelayKey> {
        self.identity_key.as_ref()
    }
    /// Return this relay's onion key, if its descriptor had one.
    pub fn onion_key(&self) -> Option<&RelayKey> {
        self.onion_key.as_ref()
    }
    /// Return this relay's advertised platform string.
    pub fn platform(&self) -> &str {
        &self.platform
    }
    /// Return the time when this relay's descriptor was published.
    pub fn published(&self) -> SystemTime {
        self.published
    }
    /// Return this relay's exit policy.
    pub fn exit_policy(&self) -> &ExitPolicy {
        &self.exit_policy
    }
    /// Return true if we believe this relay is running.
    pub fn is_running(&self) -> bool {
        self.is_running
    }
    /// Return true if we trust this relay as a directory server.
    pub fn is_trusted_dir(&self) -> bool {
        self.is_trusted_dir
    }
    /// Return true if this relay has a directory port.
    ///
    /// Directory caches are exempt from age-based eviction.
    pub fn is_dir_cache(&self) -> bool {
        self.dir_port != 0
    }

    /// Return true if this relay's exit policy refuses every target.
    pub fn rejects_all_exits(&self) -> bool {
        self.exit_policy.rejects_all()
    }

    /// Check whether this relay's exit policy allows `addr`:`port`.
    pub fn exit_outcome(&self, addr: Option<Ipv4Addr>, port: u16) -> PolicyOutcome {
        self.exit_policy.classify(addr, port)
    }

    /// Return true if `name` refers to this relay.
    ///
    /// A name starting with `$` is compared against our identity digest.
    /// Any other name matches our nickname, ignoring case, or our identity
    /// digest if it is one written without the `$`.
    pub fn nickname_matches(&self, name: &str) -> bool {
        match NameQuery::parse(name) {
            NameQuery::Digest(digest) => digest.as_ref() == Some(&self.identity),
            NameQuery::Nickname { name, maybe_digest } => {
                self.nickname.eq_ignore_ascii_case(name)
                    || maybe_digest.as_ref() == Some(&self.identity)
            }
        }
    }

    /// Return true if this record and `other` describe the same relay key.
    ///
    /// If either record lacks an identity key, compare identity digests
    /// instead.
    pub fn same_key_as(&self, other: &RelayRecord) -> bool {
        match (&self.identity_key, &other.identity_key) {
            (Some(a), Some(b)) => a == b,
            _ => self.identity == other.identity,
        }
    }

    /// Set whether we believe this relay is running.
    pub(crate) fn set_running(&mut self, running: bool) {
        self.is_running = running;
    }

    /// Mark this relay as a trusted directory server.
    ///
    /// Trust belongs to the identity, so it carries over to a newer
    /// descriptor even if that descriptor dropped its directory port.
    pub(crate) fn set_trusted_dir(&mut self) {
        self.is_trusted_dir = true;
    }

    /// Stop trusting this relay as a directory server.
    pub(crate) fn clear_trusted_dir(&mut self) {
        self.is_trusted_dir = false;
    }

    /// Record the resolved address for this relay.
    pub(crate) fn set_addr(&mut self, addr: Option<Ipv4Addr>) {
        self.addr = addr;
    }
}
