//! The list of relays that we know about.

use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

use tor_exitpolicy::PolicyOutcome;
use tracing::{debug, info, warn};

use crate::names::{NameQuery, split_name_list};
use crate::{IdentityDigest, RelayRecord};

/// Why [`RouterList::merge`] refused a relay record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RejectReason {
    /// We already had a descriptor for this relay that was at least as new.
    ///
    /// The liveness and trust flags of the refused record were still
    /// applied to the record that we kept.
    NotNewer,
    /// The nickname belongs to a relay with a different identity key.
    IdentityMismatch,
}

/// What [`RouterList::merge`] did with a relay record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum AddOutcome {
    /// The record was new, and was added to the end of the list.
    Inserted,
    /// The record replaced an older record for the same relay.
    Superseded,
    /// The record was discarded.
    Rejected(RejectReason),
}

/// A count of what happened to each record in a batch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct MergeReport {
    /// How many records were new.
    pub inserted: usize,
    /// How many records replaced older ones.
    pub superseded: usize,
    /// How many records were discarded.
    pub rejected: usize,
}

impl MergeReport {
    /// Count one more outcome.
    fn note(&mut self, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Inserted => self.inserted += 1,
            AddOutcome::Superseded => self.superseded += 1,
            AddOutcome::Rejected(_) => self.rejected += 1,
        }
    }
}

/// A set of relays, along with information about when we learned about them.
///
/// A parser produces a `RouterList` from each document it reads; the
/// current list of every relay we know is also a `RouterList`.
///
/// Records are kept in the order we learned about them.  After a
/// resolution pass, our own relay (if we are one) is the first record.
#[derive(Clone, Debug, Default)]
pub struct RouterList {
    /// The relays in this list.
    relays: Vec<RelayRecord>,
    /// When the newest document merged into this list was published.
    published: Option<SystemTime>,
    /// When the newest running-routers status we applied was published.
    running_routers_updated: Option<SystemTime>,
    /// Recommended software versions, from the newest document.
    software_versions: Option<String>,
}

impl RouterList {
    /// Return a new empty list.
    pub fn new() -> Self {
        RouterList::default()
    }

    /// Construct a list from the parts of a parsed document.
    pub fn from_parts(
        relays: Vec<RelayRecord>,
        published: Option<SystemTime>,
        software_versions: Option<String>,
    ) -> Self {
        RouterList {
            relays,
            published,
            running_routers_updated: None,
            software_versions,
        }
    }

    /// Return the relays in this list.
    pub fn relays(&self) -> &[RelayRecord] {
        &self.relays[..]
    }
    /// Return an iterator over the relays in this list.
    pub fn iter(&self) -> impl Iterator<Item = &RelayRecord> {
        self.relays.iter()
    }
    /// Return the number of relays in this list.
    pub fn len(&self) -> usize {
        self.relays.len()
    }
    /// Return true if this list has no relays.
    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
    /// Return the publication time of the newest document merged into this
    /// list, if any.
    pub fn published(&self) -> Option<SystemTime> {
        self.published
    }
    /// Return the publication time of the last running-routers status that
    /// we applied, if any.
    pub fn running_routers_updated(&self) -> Option<SystemTime> {
        self.running_routers_updated
    }
    /// Return the recommended software versions, if we know them.
    pub fn software_versions(&self) -> Option<&str> {
        self.software_versions.as_deref()
    }

    /// Add `incoming` to this list, or use it to update a record we have.
    ///
    /// Relays are matched by nickname, ignoring case:
    ///
    ///  * If no record has this nickname, `incoming` is appended.
    ///  * If a record has this nickname but a different identity key,
    ///    `incoming` is refused.
    ///  * If `incoming` is newer than the record we have, it replaces that
    ///    record.  It keeps the old record's directory trust, and if the
    ///    hostname hasn't changed, its resolved address.
    ///  * Otherwise `incoming` is discarded, but the record we keep takes
    ///    its liveness flag, and becomes trusted if `incoming` was.
    pub fn merge(&mut self, incoming: RelayRecord) -> AddOutcome {
        let Some(existing) = self
            .relays
            .iter_mut()
            .find(|r| r.nickname().eq_ignore_ascii_case(incoming.nickname()))
        else {
            debug!("Adding entry for router '{}'", incoming.nickname());
            self.relays.push(incoming);
            return AddOutcome::Inserted;
        };

        if !existing.same_key_as(&incoming) {
            warn!("Identity key mismatch for router '{}'", incoming.nickname());
            return AddOutcome::Rejected(RejectReason::IdentityMismatch);
        }

        if incoming.published() > existing.published() {
            let mut incoming = incoming;
            if existing.is_trusted_dir() {
                incoming.set_trusted_dir();
            }
            if existing.address().eq_ignore_ascii_case(incoming.address()) {
                if let Some(addr) = existing.addr() {
                    incoming.set_addr(Some(addr));
                }
            }
            debug!("Replacing entry for router '{}'", incoming.nickname());
            *existing = incoming;
            AddOutcome::Superseded
        } else {
            debug!(
                "Skipping not-newer descriptor for router '{}'",
                incoming.nickname()
            );
            if incoming.is_trusted_dir() {
                existing.set_trusted_dir();
            }
            existing.set_running(incoming.is_running());
            AddOutcome::Rejected(RejectReason::NotNewer)
        }
    }

    /// Merge every record in `batch` into this list, in order.
    ///
    /// If `batch` was published more recently than anything already in this
    /// list, adopt its publication time and software versions.
    pub fn merge_batch(&mut self, batch: RouterList) -> MergeReport {
        let RouterList {
            relays,
            published,
            software_versions,
            ..
        } = batch;

        if published > self.published {
            self.published = published;
            if software_versions.is_some() {
                self.software_versions = software_versions;
            }
        }

        let mut report = MergeReport::default();
        for relay in relays {
            report.note(self.merge(relay));
        }
        report
    }

    /// Remove every relay whose descriptor is older than `max_age`, as of
    /// `now`.
    ///
    /// Directory caches are never removed, however old they are.  Return
    /// the number of relays removed.
    pub fn evict_stale(&mut self, max_age: Duration, now: SystemTime) -> usize {
        let Some(cutoff) = now.checked_sub(max_age) else {
            return 0;
        };
        let before = self.relays.len();
        self.relays.retain(|r| {
            let keep = r.is_dir_cache() || r.published() >= cutoff;
            if !keep {
                info!("Forgetting obsolete routerinfo for node {}.", r.nickname());
            }
            keep
        });
        before - self.relays.len()
    }

    /// Return the relay with identity `id`, if we know it.
    pub fn by_digest(&self, id: &IdentityDigest) -> Option<&RelayRecord> {
        self.relays.iter().find(|r| r.identity() == id)
    }

    /// Return the relay whose identity digest is hex-encoded in `hex`.
    ///
    /// `hex` may start with `$`.  Return `None` if `hex` is malformed.
    pub fn by_hex_digest(&self, hex: &str) -> Option<&RelayRecord> {
        let hex = hex.strip_prefix('$').unwrap_or(hex);
        self.by_digest(&IdentityDigest::from_hex(hex)?)
    }

    /// Return the relay named by `name`.
    ///
    /// A name starting with `$` is a hex-encoded identity digest.  Any other
    /// name is first matched against nicknames, ignoring case; if nothing
    /// has that nickname and the name looks like a hex digest, we try it as
    /// a digest too.
    pub fn by_nickname(&self, name: &str) -> Option<&RelayRecord> {
        match NameQuery::parse(name) {
            NameQuery::Digest(digest) => self.by_digest(&digest?),
            NameQuery::Nickname { name, maybe_digest } => self
                .relays
                .iter()
                .find(|r| r.nickname().eq_ignore_ascii_case(name))
                .or_else(|| self.by_digest(&maybe_digest?)),
        }
    }

    /// Return the first relay whose resolved address is `addr` and whose
    /// onion-routing port is `or_port`.
    pub fn by_addr_port(&self, addr: Ipv4Addr, or_port: u16) -> Option<&RelayRecord> {
        self.relays
            .iter()
            .find(|r| r.addr() == Some(addr) && r.or_port() == or_port)
    }

    /// Mark the relay with identity `id` as not running.
    ///
    /// Return false if we don't know that relay.
    pub fn mark_as_down(&mut self, id: &IdentityDigest) -> bool {
        match self.relays.iter_mut().find(|r| r.identity() == id) {
            Some(relay) => {
                debug!("Marking router {} as down.", relay.nickname());
                relay.set_running(false);
                true
            }
            None => false,
        }
    }

    /// Stop trusting every relay as a directory server.
    pub fn clear_trusted_directories(&mut self) {
        for relay in &mut self.relays {
            relay.clear_trusted_dir();
        }
    }

    /// Trust every relay in this list that has a directory port as a
    /// directory server.
    pub(crate) fn trust_directory_caches(&mut self) {
        for relay in self.relays.iter_mut().filter(|r| r.is_dir_cache()) {
            relay.set_trusted_dir();
        }
    }

    /// Return true if every running relay would definitely refuse to exit
    /// to `addr`:`port`.
    ///
    /// A relay whose policy might allow the target counts as not refusing.
    pub fn all_routers_reject(&self, addr: Option<Ipv4Addr>, port: u16) -> bool {
        self.relays
            .iter()
            .filter(|r| r.is_running())
            .all(|r| r.exit_outcome(addr, port) == PolicyOutcome::Rejected)
    }

    /// Return every running relay named in the list `names`.
    ///
    /// Names of relays that are down are skipped with a warning.  Names we
    /// don't recognize are skipped too; we only warn about those if
    /// `warn_unknown` is set, since before we have a directory we expect
    /// not to know most relays.
    pub(crate) fn running_relays_named(
        &self,
        names: &str,
        warn_unknown: bool,
    ) -> Vec<&RelayRecord> {
        let mut found = Vec::new();
        for name in split_name_list(names) {
            match self.by_nickname(name) {
                Some(relay) if relay.is_running() => found.push(relay),
                Some(_) => warn!(
                    "Nickname list includes '{}' which is known but down.",
                    name
                ),
                None if warn_unknown => warn!(
                    "Nickname list includes '{}' which isn't a known router.",
                    name
                ),
                None => info!(
                    "Nickname list includes '{}' which isn't a known router.",
                    name
                ),
            }
        }
        found
    }

    /// Return a mutable reference to the relays in this list.
    pub(crate) fn relays_mut(&mut self) -> &mut Vec<RelayRecord> {
        &mut self.relays
    }

    /// Record that we applied a running-routers status published at `when`.
    pub(crate) fn set_running_routers_updated(&mut self, when: SystemTime) {
        self.running_routers_updated = Some(when);
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
    use crate::RelayKey;
    use crate::testing::{at, relay};
    use tracing_test::traced_test;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn insert_and_lookup() {
        let mut list = RouterList::new();
        let r = relay(1, "alpha").build().unwrap();
        assert_eq!(list.merge(r), AddOutcome::Inserted);
        let r = relay(2, "beta").build().unwrap();
        assert_eq!(list.merge(r), AddOutcome::Inserted);
        assert_eq!(list.len(), 2);

        let id2 = IdentityDigest::new([2; 20]);
        assert_eq!(list.by_digest(&id2).unwrap().nickname(), "beta");
        assert_eq!(list.by_nickname("BETA").unwrap().identity(), &id2);
        let (dollar_hex, bare_hex) = (id2.to_string(), "02".repeat(20));
        assert_eq!(list.by_nickname(&dollar_hex).unwrap().nickname(), "beta");
        assert_eq!(list.by_hex_digest(&bare_hex).unwrap().nickname(), "beta");
        assert_eq!(list.by_hex_digest(&dollar_hex).unwrap().nickname(), "beta");
        assert!(list.by_hex_digest("$0202").is_none());
        assert!(list.by_nickname("gamma").is_none());
        assert!(list.by_nickname("$0202").is_none());
        // A bare digest works when nothing has it as a nickname.
        let alpha = list.by_nickname(&"01".repeat(20)).unwrap();
        assert_eq!(alpha.nickname(), "alpha");
    }

    #[test]
    fn nickname_beats_bare_digest() {
        let mut list = RouterList::new();
        let hexname = "02".repeat(20);
        list.merge(relay(1, &hexname).build().unwrap());
        list.merge(relay(2, "beta").build().unwrap());
        assert_eq!(
            list.by_nickname(&hexname).unwrap().identity(),
            &IdentityDigest::new([1; 20])
        );
        assert_eq!(
            list.by_nickname(&format!("${}", hexname)).unwrap().nickname(),
            "beta"
        );
    }

    #[test]
    fn by_addr_port() {
        let mut list = RouterList::new();
        list.merge(
            relay(1, "alpha")
                .addr(Ipv4Addr::new(10, 0, 0, 1))
                .or_port(9001)
                .build()
                .unwrap(),
        );
        assert_eq!(
            list.by_addr_port(Ipv4Addr::new(10, 0, 0, 1), 9001)
                .unwrap()
                .nickname(),
            "alpha"
        );
        let (known, unknown) = (Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        assert!(list.by_addr_port(known, 9002).is_none());
        assert!(list.by_addr_port(unknown, 9001).is_none());
    }

    #[test]
    fn merge_same_record_twice() {
        let mut list = RouterList::new();
        let r = relay(1, "alpha").platform("Tor 0.0.9").build().unwrap();
        list.merge(r.clone());
        assert_eq!(list.merge(r), AddOutcome::Rejected(RejectReason::NotNewer));
        assert_eq!(list.len(), 1);
        assert_eq!(list.relays()[0].platform(), "Tor 0.0.9");
        assert!(list.relays()[0].is_running());
    }

    #[test]
    fn newer_supersedes() {
        let mut list = RouterList::new();
        list.merge(
            relay(1, "alpha")
                .address("alpha.example.com")
                .addr(Ipv4Addr::new(10, 0, 0, 1))
                .dir_port(9030)
                .is_trusted_dir(true)
                .published(at(100))
                .build()
                .unwrap(),
        );
        let outcome = list.merge(
            relay(1, "ALPHA")
                .address("Alpha.Example.COM")
                .platform("newer")
                .dir_port(9030)
                .published(at(200))
                .build()
                .unwrap(),
        );
        assert_eq!(outcome, AddOutcome::Superseded);
        assert_eq!(list.len(), 1);
        let r = &list.relays()[0];
        assert_eq!(r.platform(), "newer");
        assert_eq!(r.nickname(), "ALPHA");
        assert_eq!(r.published(), at(200));
        // Trust and the resolved address were inherited.
        assert!(r.is_trusted_dir());
        assert_eq!(r.addr(), Some(Ipv4Addr::new(10, 0, 0, 1)));

        // A new hostname means a new lookup.
        list.merge(
            relay(1, "alpha")
                .address("elsewhere.example.com")
                .published(at(300))
                .build()
                .unwrap(),
        );
        let r = &list.relays()[0];
        assert_eq!(r.addr(), None);
        // Trust sticks even though the new descriptor has no directory port.
        assert!(r.is_trusted_dir());
    }

    #[test]
    fn older_still_reports_liveness_and_trust() {
        let mut list = RouterList::new();
        list.merge(
            relay(1, "alpha")
                .dir_port(9030)
                .published(at(200))
                .build()
                .unwrap(),
        );
        let outcome = list.merge(
            relay(1, "alpha")
                .dir_port(9030)
                .is_trusted_dir(true)
                .is_running(false)
                .platform("stale")
                .published(at(100))
                .build()
                .unwrap(),
        );
        assert_eq!(outcome, AddOutcome::Rejected(RejectReason::NotNewer));
        let r = &list.relays()[0];
        assert_eq!(r.published(), at(200));
        assert_eq!(r.platform(), "");
        assert!(!r.is_running());
        assert!(r.is_trusted_dir());

        // And an untrusted older record doesn't take trust away.
        list.merge(relay(1, "alpha").published(at(50)).build().unwrap());
        let r = &list.relays()[0];
        assert!(r.is_trusted_dir());
        assert!(r.is_running());
    }

    #[test]
    #[traced_test]
    fn identity_mismatch() {
        let mut list = RouterList::new();
        list.merge(
            relay(1, "alpha")
                .identity_key(RelayKey::from_der(vec![1; 8]))
                .published(at(100))
                .build()
                .unwrap(),
        );
        let outcome = list.merge(
            relay(2, "Alpha")
                .identity_key(RelayKey::from_der(vec![2; 8]))
                .is_running(false)
                .published(at(200))
                .build()
                .unwrap(),
        );
        assert_eq!(
            outcome,
            AddOutcome::Rejected(RejectReason::IdentityMismatch)
        );
        assert!(logs_contain("Identity key mismatch for router 'Alpha'"));
        assert_eq!(list.len(), 1);
        let r = &list.relays()[0];
        assert_eq!(r.identity(), &IdentityDigest::new([1; 20]));
        assert_eq!(r.published(), at(100));
        assert!(r.is_running());
    }

    #[test]
    fn batch() {
        let mut list = RouterList::from_parts(
            vec![relay(1, "alpha").published(at(100)).build().unwrap()],
            Some(at(100)),
            Some("0.0.9".into()),
        );
        let batch = RouterList::from_parts(
            vec![
                relay(1, "alpha").published(at(200)).build().unwrap(),
                relay(2, "beta").build().unwrap(),
                relay(3, "beta").build().unwrap(),
            ],
            Some(at(300)),
            Some("0.1.0".into()),
        );
        let report = list.merge_batch(batch);
        assert_eq!(
            (report.inserted, report.superseded, report.rejected),
            (1, 1, 1)
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list.published(), Some(at(300)));
        assert_eq!(list.software_versions(), Some("0.1.0"));

        // An older batch, or one with no date, keeps our metadata.
        list.merge_batch(RouterList::from_parts(
            vec![],
            Some(at(10)),
            Some("old".into()),
        ));
        list.merge_batch(RouterList::from_parts(vec![], None, Some("undated".into())));
        assert_eq!(list.published(), Some(at(300)));
        assert_eq!(list.software_versions(), Some("0.1.0"));
    }

    #[test]
    #[traced_test]
    fn evict() {
        let now = at(2000 * 3600);
        let mut list = RouterList::from_parts(
            vec![
                relay(1, "fresh").published(now - HOUR).build().unwrap(),
                relay(2, "stale").published(now - 25 * HOUR).build().unwrap(),
                relay(3, "olddir")
                    .dir_port(80)
                    .published(now - 1000 * HOUR)
                    .build()
                    .unwrap(),
                relay(4, "edge").published(now - 24 * HOUR).build().unwrap(),
            ],
            None,
            None,
        );
        assert_eq!(list.evict_stale(24 * HOUR, now), 1);
        let names: Vec<_> = list.iter().map(|r| r.nickname()).collect();
        assert_eq!(names, vec!["fresh", "olddir", "edge"]);
        assert!(logs_contain(
            "Forgetting obsolete routerinfo for node stale.",
        ));

        // A max age reaching back before the epoch removes nothing.
        assert_eq!(list.evict_stale(Duration::MAX, now), 0);
    }

    #[test]
    fn mark_down_and_trust() {
        let mut list = RouterList::from_parts(
            vec![
                relay(1, "alpha").dir_port(9030).build().unwrap(),
                relay(2, "beta").build().unwrap(),
            ],
            None,
            None,
        );
        assert!(list.mark_as_down(&IdentityDigest::new([2; 20])));
        assert!(!list.mark_as_down(&IdentityDigest::new([9; 20])));
        assert!(!list.relays()[1].is_running());

        list.trust_directory_caches();
        assert!(list.relays()[0].is_trusted_dir());
        assert!(!list.relays()[1].is_trusted_dir());
        list.clear_trusted_directories();
        assert!(!list.relays()[0].is_trusted_dir());
    }

    #[test]
    fn all_reject() {
        let mut list = RouterList::from_parts(
            vec![
                relay(1, "a")
                    .exit_policy("reject *:*".parse().unwrap())
                    .build()
                    .unwrap(),
                relay(2, "b")
                    .exit_policy("accept *:80, reject *:*".parse().unwrap())
                    .is_running(false)
                    .build()
                    .unwrap(),
            ],
            None,
            None,
        );
        // The relay that accepts port 80 is down.
        assert!(list.all_routers_reject(None, 80));
        list.relays_mut()[1].set_running(true);
        assert!(!list.all_routers_reject(None, 80));
        assert!(list.all_routers_reject(None, 443));

        // "Unknown" isn't "rejected".
        list.merge(
            relay(3, "c")
                .exit_policy("accept 10.0.0.0/8:443, reject *:*".parse().unwrap())
                .build()
                .unwrap(),
        );
        assert!(!list.all_routers_reject(None, 443));
        let outside = Ipv4Addr::new(11, 0, 0, 1);
        assert!(list.all_routers_reject(Some(outside), 443));

        assert!(RouterList::new().all_routers_reject(None, 80));
    }

    #[test]
    #[traced_test]
    fn named() {
        let list = RouterList::from_parts(
            vec![
                relay(1, "alpha").build().unwrap(),
                relay(2, "beta").is_running(false).build().unwrap(),
                relay(3, "gamma").build().unwrap(),
            ],
            None,
            None,
        );
        let names = format!("alpha, beta ${} delta", "03".repeat(20));
        let found = list.running_relays_named(&names, false);
        let names: Vec<_> = found.iter().map(|r| r.nickname()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);
        assert!(logs_contain(
            "Nickname list includes 'beta' which is known but down.",
        ));
        assert!(logs_contain(
            "Nickname list includes 'delta' which isn't a known router.",
        ));
        logs_assert(|lines: &[&str]| {
            match lines.iter().any(|l| l.contains("INFO") && l.contains("'delta'")) {
                true => Ok(()),
                false => Err("unknown name not logged at info".into()),
            }
        });
    }

    #[test]
    #[traced_test]
    fn named_warns_after_fetch() {
        let list = RouterList::new();
        assert!(list.running_relays_named("delta", true).is_empty());
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .any(|l| l.contains("WARN") && l.contains("'delta' which isn't a known router"))
            {
                true => Ok(()),
                false => Err("unknown name not logged at warn".into()),
            }
        });
    }
}
