//! Lists of relay names, as they appear in configuration and status
//! documents.

use crate::{HEX_DIGEST_LEN, IdentityDigest};

/// Split a list of relay names into its individual names.
///
/// Names are separated by any run of whitespace and commas.
pub(crate) fn split_name_list(names: &str) -> impl Iterator<Item = &str> {
    names
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|name| !name.is_empty())
}

/// A relay name, parsed into the ways it might identify a relay.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum NameQuery<'a> {
    /// A `$`-prefixed identity digest.
    ///
    /// `None` if the digest was malformed, in which case nothing matches.
    Digest(Option<IdentityDigest>),
    /// Anything else: a nickname, which might also happen to be a digest
    /// written without its `$`.
    Nickname {
        /// The name as written.
        name: &'a str,
        /// The name, decoded as a digest, if it has the right form.
        maybe_digest: Option<IdentityDigest>,
    },
}

impl<'a> NameQuery<'a> {
    /// Parse a single relay name.
    pub(crate) fn parse(name: &'a str) -> Self {
        match name.strip_prefix('$') {
            Some(hex) => NameQuery::Digest(IdentityDigest::from_hex(hex)),
            None => NameQuery::Nickname {
                name,
                maybe_digest: (name.len() == HEX_DIGEST_LEN)
                    .then(|| IdentityDigest::from_hex(name))
                    .flatten(),
            },
        }
    }
}
