//! Declare error types for tor-routerlist

use std::sync::Arc;

use thiserror::Error;

use crate::DocKind;

/// An error returned by the router list code.
#[derive(Error, Clone, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A document of relay descriptors could not be parsed.
    ///
    /// Nothing from the document was applied.
    #[error("Couldn't parse relay information")]
    Parse(#[from] ParseError),
    /// We couldn't find an address for a relay's hostname.
    #[error("Could not get address for router {nickname} ({hostname})")]
    Resolve {
        /// The relay we were resolving.
        nickname: String,
        /// The hostname that didn't resolve.
        hostname: String,
        /// What went wrong.
        #[source]
        cause: ResolveError,
    },
    /// We couldn't read directory information from its configured location.
    #[error("Failed to load directory information from {location}")]
    Load {
        /// Where we tried to load from.
        location: String,
        /// The underlying IO error.
        #[source]
        cause: Arc<std::io::Error>,
    },
    /// We tried to change the router list before we had loaded one.
    #[error("No router list has been loaded")]
    NoRouterList,
    /// A relay record violated one of the rules that every record must obey.
    #[error("Invalid relay record: {0}")]
    InvalidRelay(String),
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Error::InvalidRelay(format!("missing field {}", e.field_name()))
    }
}

/// An error reported by a [`RouterListParser`](crate::RouterListParser).
#[derive(Error, Clone, Debug)]
#[error("Error parsing {doc}: {msg}")]
pub struct ParseError {
    /// What kind of document we were parsing.
    doc: DocKind,
    /// A description of the problem.
    msg: String,
}

impl ParseError {
    /// Construct a new ParseError for a document of type `doc`.
    pub fn new(doc: DocKind, msg: impl Into<String>) -> Self {
        ParseError {
            doc,
            msg: msg.into(),
        }
    }

    /// Return the kind of document that failed to parse.
    pub fn doc_kind(&self) -> DocKind {
        self.doc
    }
}

/// An error returned by a [`Resolver`](crate::Resolver).
#[derive(Error, Clone, Debug)]
#[non_exhaustive]
pub enum ResolveError {
    /// The name had no addresses.
    #[error("Hostname not found")]
    NotFound,
    /// The name resolved, but only to an address we can't use.
    #[error("Hostname resolved to an unusable address")]
    Unusable,
    /// The lookup itself failed.
    #[error("Lookup failed")]
    Io(#[source] Arc<std::io::Error>),
}
