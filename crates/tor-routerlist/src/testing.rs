//! Helpers for testing code that uses a router list.
//!
//! Nothing here is covered by semver, and none of it is suitable for use
//! outside of tests.

// Printing the RNG seed is how a failing test tells you how to reproduce it.
#![allow(clippy::print_stdout)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::{RngCore, SeedableRng};

use crate::{
    Collaborators, DocKind, IdentityDigest, NotARelay, ParseError, RelayRecord, RelayRecordBuilder,
    ResolveError, RouterList, RouterListParser, TextSource,
};
use crate::{LocalRelay, Resolver};

pub use rand_chacha::ChaCha12Rng as TestingRng;

/// The seed type for [`TestingRng`].
type Seed = <TestingRng as SeedableRng>::Seed;

/// The environment variable that controls [`testing_rng`].
const PRNG_VAR: &str = "ARTI_TEST_PRNG";

/// Seed used when `ARTI_TEST_PRNG` is `deterministic`.
const DEFAULT_SEED: Seed = *b"router list tests, fixed seed 01";

/// Return a new PRNG for use in tests.
///
/// If `ARTI_TEST_PRNG` is unset or `random`, the PRNG has a random seed.
/// If it is `deterministic`, the seed is always the same.  Otherwise it
/// must be a hex-encoded seed.  Either way, we print the seed, so that a
/// failing test can be reproduced.
///
/// # Panics
///
/// Panics if `ARTI_TEST_PRNG` has a value we don't recognize.
pub fn testing_rng() -> TestingRng {
    let seed = match std::env::var(PRNG_VAR).as_deref() {
        Err(_) | Ok("") | Ok("random") => {
            let mut seed = Seed::default();
            rand::rng().fill_bytes(&mut seed[..]);
            seed
        }
        Ok("deterministic") => DEFAULT_SEED,
        Ok(s) => match hex::decode(s).ok().and_then(|v| Seed::try_from(v).ok()) {
            Some(seed) => seed,
            None => panic!(
                "Bad value for {}: {:?}\n\
                 We recognize `random`, `deterministic`, or a hexadecimal seed.",
                PRNG_VAR, s
            ),
        },
    };
    println!("  Using RNG seed {}={}", PRNG_VAR, hex::encode(seed));
    TestingRng::from_seed(seed)
}

/// Return the time `secs` seconds after the epoch.
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// Return a builder for a relay with a made-up identity and hostname.
///
/// The identity is 20 copies of `n`; the hostname is
/// `<nickname>.example.com`; the descriptor was published at `at(1000)`.
pub fn relay(n: u8, nickname: &str) -> RelayRecordBuilder {
    let mut b = RelayRecord::builder();
    b.identity(IdentityDigest::new([n; 20]))
        .nickname(nickname)
        .address(format!("{}.example.com", nickname))
        .or_port(9001)
        .published(at(1000));
    b
}

/// A [`Resolver`] that knows a fixed set of hostnames.
#[derive(Clone, Debug, Default)]
pub struct MockResolver {
    /// Map from hostname to address.
    hosts: HashMap<String, Ipv4Addr>,
}

impl MockResolver {
    /// Return a resolver that knows no hostnames.
    pub fn new() -> Self {
        MockResolver::default()
    }

    /// Make `hostname` resolve to `addr`.
    pub fn with(mut self, hostname: &str, addr: Ipv4Addr) -> Self {
        self.hosts.insert(hostname.to_owned(), addr);
        self
    }
}

impl Resolver for MockResolver {
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr, ResolveError> {
        self.hosts
            .get(hostname)
            .copied()
            .ok_or(ResolveError::NotFound)
    }
}

/// A [`LocalRelay`] that runs a given relay.
#[derive(Clone, Debug)]
pub struct MockLocalRelay {
    /// Our relay.
    me: RelayRecord,
}

impl MockLocalRelay {
    /// Pretend that we are running `me`.
    pub fn new(me: RelayRecord) -> Self {
        MockLocalRelay { me }
    }
}

impl LocalRelay for MockLocalRelay {
    fn my_relay(&self) -> Option<RelayRecord> {
        Some(self.me.clone())
    }

    fn is_me(&self, relay: &RelayRecord) -> bool {
        relay.identity() == self.me.identity()
    }
}

/// A [`RouterListParser`] that knows the answer for a fixed set of
/// documents, and can't parse anything else.
#[derive(Clone, Debug, Default)]
pub struct MockParser {
    /// Map from document text to the list it parses as.
    docs: HashMap<String, RouterList>,
}

impl MockParser {
    /// Return a parser that can't parse anything.
    pub fn new() -> Self {
        MockParser::default()
    }

    /// Make `text` parse as `list`.
    pub fn with(mut self, text: &str, list: RouterList) -> Self {
        self.docs.insert(text.to_owned(), list);
        self
    }
}

impl RouterListParser for MockParser {
    fn parse(&self, text: &str, kind: DocKind) -> Result<RouterList, ParseError> {
        self.docs
            .get(text)
            .cloned()
            .ok_or_else(|| ParseError::new(kind, "unrecognized test document"))
    }
}

/// Return a set of collaborators for a client that uses `parser`, resolves
/// no hostnames, has no connections, and has an empty built-in directory
/// list.
pub fn collaborators(parser: MockParser) -> Collaborators {
    Collaborators {
        parser: Arc::new(parser),
        resolver: Arc::new(MockResolver::new()),
        local_relay: Arc::new(NotARelay),
        connections: Arc::new(std::collections::HashSet::<IdentityDigest>::new()),
        default_dirservers: Arc::new(TextSource::new("")),
    }
}
