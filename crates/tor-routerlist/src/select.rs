//! Choosing random relays from a router list.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::warn;

use crate::{IdentityDigest, RelayRecord, RouterList};

/// A rule for which relays in a list may be chosen.
///
/// Every kind of selection that we do is expressed as a `CandidateSource`,
/// so that they can share the same exclusion and random-choice logic.
pub trait CandidateSource {
    /// Return true if `relay` may be chosen.
    fn permits(&self, relay: &RelayRecord) -> bool;
}

impl<F> CandidateSource for F
where
    F: Fn(&RelayRecord) -> bool,
{
    fn permits(&self, relay: &RelayRecord) -> bool {
        self(relay)
    }
}

/// A set of relays that must not be chosen.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RelayExclusion {
    /// The identities of the excluded relays.
    ids: HashSet<IdentityDigest>,
}

impl RelayExclusion {
    /// Return a new exclusion that excludes nothing.
    pub fn no_relays_excluded() -> Self {
        RelayExclusion::default()
    }

    /// Exclude the relay with identity `id`.
    pub fn insert(&mut self, id: IdentityDigest) {
        self.ids.insert(id);
    }

    /// Return true if `id` is excluded.
    pub fn contains(&self, id: &IdentityDigest) -> bool {
        self.ids.contains(id)
    }

    /// Return true if `relay` is excluded.
    pub fn excludes(&self, relay: &RelayRecord) -> bool {
        self.contains(relay.identity())
    }

    /// Return the number of excluded relays.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Return true if nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<IdentityDigest> for RelayExclusion {
    fn from_iter<T: IntoIterator<Item = IdentityDigest>>(iter: T) -> Self {
        RelayExclusion {
            ids: iter.into_iter().collect(),
        }
    }
}

impl Extend<IdentityDigest> for RelayExclusion {
    fn extend<T: IntoIterator<Item = IdentityDigest>>(&mut self, iter: T) {
        self.ids.extend(iter);
    }
}

/// An object that knows which relays we have open connections to.
pub trait ConnectionTracker: Send + Sync {
    /// Return true if we have a live connection to the relay with identity
    /// `id`.
    fn has_live_connection(&self, id: &IdentityDigest) -> bool;
}

impl ConnectionTracker for HashSet<IdentityDigest> {
    fn has_live_connection(&self, id: &IdentityDigest) -> bool {
        self.contains(id)
    }
}

/// Choose uniformly at random among the relays in `relays` that `source`
/// permits and `exclusion` doesn't exclude.
pub(crate) fn choose_candidate<'a, R, S>(
    rng: &mut R,
    relays: impl IntoIterator<Item = &'a RelayRecord>,
    source: &S,
    exclusion: &RelayExclusion,
) -> Option<&'a RelayRecord>
where
    R: Rng + ?Sized,
    S: CandidateSource + ?Sized,
{
    let candidates: Vec<&RelayRecord> = relays
        .into_iter()
        .filter(|r| source.permits(r) && !exclusion.excludes(r))
        .collect();
    candidates.choose(rng).copied()
}

/// Every running relay, optionally restricted to those we're connected to.
struct RunningRelays<'a> {
    /// If present, only relays we have a live connection to are permitted.
    live: Option<&'a dyn ConnectionTracker>,
}

impl CandidateSource for RunningRelays<'_> {
    fn permits(&self, relay: &RelayRecord) -> bool {
        relay.is_running()
            && self
                .live
                .is_none_or(|t| t.has_live_connection(relay.identity()))
    }
}

/// Rules for picking a random relay, by name.
///
/// We first try to pick one of the running relays named in a list of
/// preferred names.  If none of them is available, we fall back to any
/// running relay.  Either way, we never pick a relay that is excluded,
/// whether by name or by identity.
///
/// # Example
///
/// ```
/// use tor_routerlist::{NodeSelector, RouterList};
///
/// let list = RouterList::new();
/// let mut rng = rand::rng();
/// let choice = NodeSelector::new()
///     .prefer("moria1, tor26")
///     .exclude_names("$AB6F3E9C2B8D1C4E5F6A7B8C9D0E1F2A3B4C5D6E")
///     .select(&mut rng, &list);
/// assert!(choice.is_none());
/// ```
#[derive(Clone, Default)]
pub struct NodeSelector<'a> {
    /// Names of the relays we'd like to use.
    preferred: &'a str,
    /// Names of relays we must not use.
    excluded_names: &'a str,
    /// Identities of relays we must not use.
    exclusion: RelayExclusion,
    /// If present, the fallback only uses relays we're connected to.
    live: Option<&'a dyn ConnectionTracker>,
    /// Whether to warn (rather than merely note) names we don't recognize.
    warn_unknown: bool,
}

impl<'a> NodeSelector<'a> {
    /// Return a new selector that may pick any running relay.
    pub fn new() -> Self {
        NodeSelector::default()
    }

    /// Prefer the relays named in `names`.
    ///
    /// Names are separated by whitespace or commas.  See
    /// [`RouterList::by_nickname`] for the forms a name can take.
    pub fn prefer(mut self, names: &'a str) -> Self {
        self.preferred = names;
        self
    }

    /// Never pick any of the relays named in `names`.
    pub fn exclude_names(mut self, names: &'a str) -> Self {
        self.excluded_names = names;
        self
    }

    /// Never pick any of the relays in `exclusion`.
    pub fn exclude(mut self, exclusion: RelayExclusion) -> Self {
        self.exclusion.extend(exclusion.ids);
        self
    }

    /// When falling back to arbitrary relays, only pick relays that
    /// `tracker` says we have a live connection to.
    pub fn require_live_connection(mut self, tracker: &'a dyn ConnectionTracker) -> Self {
        self.live = Some(tracker);
        self
    }

    /// Warn about names that we don't recognize.
    ///
    /// Once we have downloaded a directory we ought to know every relay, so
    /// an unknown name is worth a warning.
    pub fn warn_unknown_names(mut self, warn_unknown: bool) -> Self {
        self.warn_unknown = warn_unknown;
        self
    }

    /// Pick a random relay from `list` according to these rules.
    ///
    /// Return `None` if there is no suitable relay.
    pub fn select<'l, R>(&self, rng: &mut R, list: &'l RouterList) -> Option<&'l RelayRecord>
    where
        R: Rng + ?Sized,
    {
        let mut exclusion = self.exclusion.clone();
        exclusion.extend(
            list.running_relays_named(self.excluded_names, self.warn_unknown)
                .into_iter()
                .map(|r| *r.identity()),
        );

        let preferred = list.running_relays_named(self.preferred, self.warn_unknown);
        if let Some(relay) = choose_candidate(rng, preferred, &|_: &RelayRecord| true, &exclusion)
        {
            return Some(relay);
        }

        let fallback = RunningRelays { live: self.live };
        let choice = choose_candidate(rng, list.iter(), &fallback, &exclusion);
        if choice.is_none() {
            warn!("No available nodes when trying to choose node. Failing.");
        }
        choice
    }
}
