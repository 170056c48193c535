//! Relay identities and key handles.

use std::fmt;
use std::sync::Arc;

use subtle::ConstantTimeEq;

/// How many bytes are in a relay's identity digest?
pub const DIGEST_LEN: usize = 20;

/// How many characters does a hex-encoded identity digest take?
pub const HEX_DIGEST_LEN: usize = DIGEST_LEN * 2;

/// The durable identity of a relay: a digest of its public identity key.
///
/// Unlike a nickname, an identity digest is unique to one relay and never
/// changes when the relay publishes a new descriptor.
///
/// When written in a list of names, an identity is hex-encoded and marked
/// with a leading `$`.
#[derive(Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq)]
pub struct IdentityDigest([u8; DIGEST_LEN]);

impl IdentityDigest {
    /// Construct an identity digest from its raw bytes.
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        IdentityDigest(bytes)
    }

    /// Construct an identity digest from a slice of bytes.
    ///
    /// Return `None` if the slice is the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(IdentityDigest(bytes.try_into().ok()?))
    }

    /// Decode an identity digest from exactly [`HEX_DIGEST_LEN`] hex digits.
    ///
    /// Return `None` if `s` is the wrong length or isn't hex.  A leading `$`
    /// is _not_ accepted here.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != HEX_DIGEST_LEN {
            return None;
        }
        let mut bytes = [0_u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(IdentityDigest(bytes))
    }

    /// Return the bytes of this digest.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Display for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", hex::encode_upper(self.0))
    }
}

impl fmt::Debug for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityDigest {{ {} }}", self)
    }
}

impl serde::Serialize for IdentityDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode_upper(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for IdentityDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let hex = s.strip_prefix('$').unwrap_or(&s);
        IdentityDigest::from_hex(hex)
            .ok_or_else(|| serde::de::Error::custom("wrong encoding for identity digest"))
    }
}

/// A handle to a relay's public key, as it appeared in the relay's descriptor.
///
/// We never do any cryptography with these keys here: we only need to
/// duplicate them, drop them, and tell whether two of them are the same key.
/// Cloning a `RelayKey` is cheap.
#[derive(Clone)]
pub struct RelayKey(Arc<[u8]>);

impl RelayKey {
    /// Wrap the DER encoding of a public key.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        RelayKey(der.into().into())
    }

    /// Return the DER encoding of this key.
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for RelayKey {
    fn eq(&self, other: &Self) -> bool {
        // Lengths aren't secret; contents are compared in constant time.
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}
impl Eq for RelayKey {}

impl fmt::Debug for RelayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayKey {{ {} bytes }}", self.0.len())
    }
}
