//! Hostname resolution for the relays in a router list.

use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::{Error, RelayRecord, ResolveError, Result, RouterList};

/// An object that can look up the address for a hostname.
///
/// Lookups are synchronous: the router list is locked while we resolve
/// its relays.
pub trait Resolver: Send + Sync {
    /// Return an IPv4 address for `hostname`.
    fn resolve(&self, hostname: &str) -> std::result::Result<Ipv4Addr, ResolveError>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> std::result::Result<Ipv4Addr, ResolveError> + Send + Sync,
{
    fn resolve(&self, hostname: &str) -> std::result::Result<Ipv4Addr, ResolveError> {
        self(hostname)
    }
}

/// Information about the relay that we're running, if we are one.
pub trait LocalRelay: Send + Sync {
    /// Return a record describing our own relay, or `None` if we aren't
    /// running as a relay.
    fn my_relay(&self) -> Option<RelayRecord>;

    /// Return true if `relay` describes our own relay.
    fn is_me(&self, relay: &RelayRecord) -> bool;
}

/// A [`LocalRelay`] for a client that isn't a relay.
#[derive(Clone, Copy, Debug, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct NotARelay;

impl LocalRelay for NotARelay {
    fn my_relay(&self) -> Option<RelayRecord> {
        None
    }

    fn is_me(&self, _relay: &RelayRecord) -> bool {
        false
    }
}

/// Look up the address of `relay`'s hostname, and store it in `relay`.
fn resolve_relay(relay: &mut RelayRecord, resolver: &dyn Resolver) -> Result<()> {
    let addr = resolver
        .resolve(relay.address())
        .and_then(|addr| {
            if addr.is_unspecified() {
                Err(ResolveError::Unusable)
            } else {
                Ok(addr)
            }
        })
        .map_err(|cause| Error::Resolve {
            nickname: relay.nickname().to_owned(),
            hostname: relay.address().to_owned(),
            cause,
        })?;
    relay.set_addr(Some(addr));
    Ok(())
}

/// Make sure that every relay in `list` has an address, and that our own
/// relay (if any) is at the front of the list.
///
/// Relays whose hostnames don't resolve are removed, as are any stale
/// copies of our own relay.  Return the number of relays removed.
///
/// Running this twice in a row is harmless: the second run replaces our own
/// relay with a fresh copy, and resolves nothing.
pub(crate) fn resolve_pass(
    list: &mut RouterList,
    resolver: &dyn Resolver,
    local: &dyn LocalRelay,
) -> usize {
    let relays = list.relays_mut();
    let mut idx = 0;
    if let Some(mine) = local.my_relay() {
        relays.insert(0, mine);
        idx = 1;
    }

    let mut removed = 0;
    while idx < relays.len() {
        let relay = &mut relays[idx];
        let keep = if local.is_me(relay) {
            debug!(
                "Dropping extra entry for our own router '{}'",
                relay.nickname()
            );
            false
        } else if relay.addr().is_some() {
            true
        } else {
            match resolve_relay(relay, resolver) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Couldn't resolve router {}; not using: {}",
                        relay.address(),
                        e
                    );
                    false
                }
            }
        };

        if keep {
            idx += 1;
        } else {
            // The next relay slides into this slot, so don't advance.
            relays.remove(idx);
            removed += 1;
        }
    }
    removed
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
    use crate::IdentityDigest;
    use crate::testing::{MockLocalRelay, MockResolver, relay};
    use tracing_test::traced_test;

    fn names(list: &RouterList) -> Vec<&str> {
        list.iter().map(|r| r.nickname()).collect()
    }

    #[test]
    #[traced_test]
    fn drops_unresolvable() {
        let resolver = MockResolver::new()
            .with("a.example.com", Ipv4Addr::new(10, 0, 0, 1))
            .with("zero.example.com", Ipv4Addr::UNSPECIFIED)
            .with("c.example.com", Ipv4Addr::new(10, 0, 0, 3));
        let mut list = RouterList::from_parts(
            vec![
                relay(1, "a").build().unwrap(),
                relay(2, "b").build().unwrap(),
                // Two bad relays in a row: the second must still be checked.
                relay(3, "zero").build().unwrap(),
                relay(4, "c").build().unwrap(),
                relay(5, "d")
                    .address("unlisted.example.com")
                    .addr(Ipv4Addr::new(10, 0, 0, 5))
                    .build()
                    .unwrap(),
            ],
            None,
            None,
        );
        let removed = resolve_pass(&mut list, &resolver, &NotARelay);
        assert_eq!(removed, 2);
        assert_eq!(names(&list), vec!["a", "c", "d"]);
        assert_eq!(list.relays()[0].addr(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(list.relays()[1].addr(), Some(Ipv4Addr::new(10, 0, 0, 3)));
        for host in ["b.example.com", "zero.example.com"] {
            assert!(logs_contain(&format!(
                "Couldn't resolve router {}; not using",
                host
            )));
        }

        // Nothing left to do the second time.
        assert_eq!(resolve_pass(&mut list, &resolver, &NotARelay), 0);
        assert_eq!(names(&list), vec!["a", "c", "d"]);
    }

    #[test]
    fn puts_me_first() {
        let resolver = MockResolver::new()
            .with("a.example.com", Ipv4Addr::new(10, 0, 0, 1))
            .with("b.example.com", Ipv4Addr::new(10, 0, 0, 2));
        let me = MockLocalRelay::new(
            relay(9, "me")
                .addr(Ipv4Addr::new(192, 0, 2, 9))
                .build()
                .unwrap(),
        );
        let mut list = RouterList::from_parts(
            vec![
                relay(1, "a").build().unwrap(),
                // Somebody else's copy of our descriptor.
                relay(9, "me").build().unwrap(),
                relay(2, "b").build().unwrap(),
            ],
            None,
            None,
        );
        assert_eq!(resolve_pass(&mut list, &resolver, &me), 1);
        assert_eq!(names(&list), vec!["me", "a", "b"]);
        assert_eq!(list.relays()[0].addr(), Some(Ipv4Addr::new(192, 0, 2, 9)));

        // Again: our old copy is replaced, and nothing else changes.
        assert_eq!(resolve_pass(&mut list, &resolver, &me), 1);
        assert_eq!(names(&list), vec!["me", "a", "b"]);
        assert_eq!(
            list.iter()
                .filter(|r| r.identity() == &IdentityDigest::new([9; 20]))
                .count(),
            1
        );
    }

    #[test]
    fn closure_resolver() {
        let resolver = |host: &str| {
            if host == "a.example.com" {
                Ok(Ipv4Addr::new(127, 0, 0, 1))
            } else {
                Err(ResolveError::NotFound)
            }
        };
        let mut r = relay(1, "a").build().unwrap();
        resolve_relay(&mut r, &resolver).unwrap();
        assert_eq!(r.addr(), Some(Ipv4Addr::new(127, 0, 0, 1)));

        let mut r = relay(2, "b").build().unwrap();
        match resolve_relay(&mut r, &resolver) {
            Err(Error::Resolve {
                nickname,
                hostname,
                cause: ResolveError::NotFound,
            }) => {
                assert_eq!(nickname, "b");
                assert_eq!(hostname, "b.example.com");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(r.addr(), None);
    }
}
