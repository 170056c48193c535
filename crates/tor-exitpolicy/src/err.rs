//! Error type for the tor-exitpolicy crate.

use thiserror::Error;

/// An error returned while parsing a policy rule or one of its parts.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PolicyError {
    /// A port was not a number in the range 0..=65535.
    #[error("Invalid port")]
    InvalidPort,
    /// A port range had its bounds in the wrong order.
    #[error("Invalid port range")]
    InvalidRange,
    /// An address could not be parsed as an IPv4 address.
    #[error("Invalid address")]
    InvalidAddress,
    /// A mask was neither a prefix length from 0 to 32 nor a dotted quad.
    #[error("Invalid mask")]
    InvalidMask,
    /// A rule was not of the form `accept|reject ADDR[/MASK]:PORTS`.
    #[error("Invalid policy")]
    InvalidPolicy,
}
