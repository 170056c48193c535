//! Choosing a trusted directory server.

use rand::Rng;
use tracing::{info, warn};

use crate::select::{CandidateSource, choose_candidate};
use crate::{RelayExclusion, RelayRecord, RouterList};

/// The relays that we trust to give us directory information.
struct TrustedDirectories;

impl CandidateSource for TrustedDirectories {
    fn permits(&self, relay: &RelayRecord) -> bool {
        relay.is_trusted_dir() && relay.is_running()
    }
}

impl RouterList {
    /// Return true if none of our trusted directory servers is running.
    pub fn all_directory_servers_down(&self) -> bool {
        !self.iter().any(|r| TrustedDirectories.permits(r))
    }

    /// Choose a random running trusted directory server, without changing
    /// anything.
    pub fn choose_running_directory<R>(&self, rng: &mut R) -> Option<&RelayRecord>
    where
        R: Rng + ?Sized,
    {
        choose_candidate(
            rng,
            self.iter(),
            &TrustedDirectories,
            &RelayExclusion::no_relays_excluded(),
        )
    }

    /// Choose a random running trusted directory server.
    ///
    /// If we think that every trusted directory server is down, assume
    /// they're only unreachable for now: mark them all as running, and
    /// choose among them.  Return `None` only if we have no trusted
    /// directory servers at all.
    pub fn pick_directory_server<R>(&mut self, rng: &mut R) -> Option<&RelayRecord>
    where
        R: Rng + ?Sized,
    {
        if self.all_directory_servers_down() {
            info!("No dirservers are reachable. Trying them all again.");
            for relay in self.relays_mut().iter_mut().filter(|r| r.is_trusted_dir()) {
                relay.set_running(true);
            }
        }
        let choice = self.choose_running_directory(rng);
        if choice.is_none() {
            warn!("No trusted directory servers in router list.");
        }
        choice
    }
}
