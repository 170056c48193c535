//! Running-routers status updates.
//!
//! A running-routers document is a short list of relay names, published by
//! a directory server more often than full directories.  Each name asserts
//! that a relay is up; a name starting with `!` asserts that it is down.

use std::time::SystemTime;

use tracing::debug;

use crate::{RelayRecord, RouterList};

/// One name in a running-routers list.
#[derive(Clone, Debug, Eq, PartialEq)]
struct StatusEntry {
    /// The relay's nickname or `$`-prefixed identity digest.
    name: String,
    /// True if the relay is listed as running.
    running: bool,
}

/// A parsed running-routers status document.
#[derive(Clone, Debug)]
pub struct RunningRouters {
    /// When this status was published.
    published: SystemTime,
    /// The names in this status, in the order they appeared.
    entries: Vec<StatusEntry>,
}

/// What happened when we tried to apply a [`RunningRouters`] status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RunningUpdateOutcome {
    /// The status was applied.
    Applied {
        /// How many relays the status said anything about.
        matched: usize,
    },
    /// The status was no newer than what we already had, and was ignored.
    Stale,
}

impl RunningRouters {
    /// Construct a status published at `published`, listing `names`.
    ///
    /// A name with a leading `!` marks its relay as down.
    pub fn new<I, S>(published: SystemTime, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                match name.strip_prefix('!') {
                    Some(down) => StatusEntry {
                        name: down.to_owned(),
                        running: false,
                    },
                    None => StatusEntry {
                        name: name.to_owned(),
                        running: true,
                    },
                }
            })
            .collect();
        RunningRouters { published, entries }
    }

    /// Return the time when this status was published.
    pub fn published(&self) -> SystemTime {
        self.published
    }

    /// Return the number of names in this status.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true if this status lists no names.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return what this status says about `relay`, if anything.
    ///
    /// Only the first name that matches `relay` counts.
    pub fn status_for(&self, relay: &RelayRecord) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| relay.nickname_matches(&e.name))
            .map(|e| e.running)
    }
}

impl RouterList {
    /// Update the liveness of our relays from a running-routers status.
    ///
    /// The status is ignored unless it is newer than both our last full
    /// directory and the last status we applied.  Relays that it doesn't
    /// mention keep their current liveness.
    pub fn apply_running_routers(&mut self, status: &RunningRouters) -> RunningUpdateOutcome {
        let when = status.published();
        if self.published().is_some_and(|p| p >= when)
            || self.running_routers_updated().is_some_and(|p| p >= when)
        {
            debug!(
                "Ignoring running-routers status that isn't newer than what we have."
            );
            return RunningUpdateOutcome::Stale;
        }

        let mut matched = 0;
        for relay in self.relays_mut() {
            if let Some(running) = status.status_for(relay) {
                relay.set_running(running);
                matched += 1;
            }
        }
        self.set_running_routers_updated(when);
        RunningUpdateOutcome::Applied { matched }
    }
}
