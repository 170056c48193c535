//! The router list manager: the shared, current list of relays.

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::resolve::resolve_pass;
use crate::shared_ref::SharedMutArc;
use crate::{
    AddOutcome, ConnectionTracker, DirectorySource, DocKind, FileSource, IdentityDigest,
    LocalRelay, MergeReport, NodeSelector, RelayExclusion, RelayRecord, Resolver, Result,
    RouterList, RouterListConfig, RouterListParser, RunningRouters, RunningUpdateOutcome,
};

/// The objects that a [`RouterListMgr`] relies on to do the parts of its
/// job that aren't about the list itself.
#[allow(clippy::exhaustive_structs)]
#[derive(Clone)]
pub struct Collaborators {
    /// Turns documents into router lists.
    pub parser: Arc<dyn RouterListParser>,
    /// Looks up relay hostnames.
    pub resolver: Arc<dyn Resolver>,
    /// Tells us about our own relay, if we are one.
    pub local_relay: Arc<dyn LocalRelay>,
    /// Tells us which relays we're connected to.
    pub connections: Arc<dyn ConnectionTracker>,
    /// Built-in list of directory servers, used when no router file is
    /// configured.
    pub default_dirservers: Arc<dyn DirectorySource>,
}

/// A handle to the current list of relays.
///
/// Every change to the list happens under a single write lock, and readers
/// work from snapshots, so no reader ever sees a half-applied change.
pub struct RouterListMgr {
    /// Our configuration.
    config: RouterListConfig,
    /// The current router list, if we've loaded one.
    list: SharedMutArc<RouterList>,
    /// The objects we use to parse, resolve, and so on.
    collab: Collaborators,
    /// True once we've loaded a directory from a directory server.
    ///
    /// Before then, we expect not to know about most relays.
    has_fetched_directory: AtomicBool,
}

impl RouterListMgr {
    /// Construct a new manager with no router list.
    pub fn new(config: RouterListConfig, collab: Collaborators) -> Self {
        RouterListMgr {
            config,
            list: SharedMutArc::new(),
            collab,
            has_fetched_directory: AtomicBool::new(false),
        }
    }

    /// Return our configuration.
    pub fn config(&self) -> &RouterListConfig {
        &self.config
    }

    /// Return a snapshot of the current router list, if we have one.
    ///
    /// The snapshot won't change, even if the list is updated later.
    pub fn snapshot(&self) -> Option<Arc<RouterList>> {
        self.list.get()
    }

    /// Return true if we have loaded a directory from a directory server
    /// since we last had to reload our trusted directories.
    pub fn has_fetched_directory(&self) -> bool {
        self.has_fetched_directory.load(Ordering::SeqCst)
    }

    /// Throw away the current router list, and use `list` instead.
    pub fn replace_router_list(&self, list: RouterList) {
        self.list.replace(list);
    }

    /// Parse `text` as a router file, and merge its relays into our list.
    ///
    /// If `trusted` is set, every relay in the file that has a directory
    /// port becomes a trusted directory server.
    ///
    /// If the file can't be parsed, our list is unchanged.
    pub fn load_from_string(&self, text: &str, trusted: bool) -> Result<MergeReport> {
        let mut batch = self.collab.parser.parse(text, DocKind::RouterFile)?;
        if trusted {
            batch.trust_directory_caches();
        }
        Ok(self.merge_and_resolve(batch))
    }

    /// Parse `text` as a directory, and merge its relays into our list.
    ///
    /// If the directory can't be parsed, our list is unchanged.
    pub fn load_from_directory(&self, text: &str) -> Result<MergeReport> {
        let batch = self.collab.parser.parse(text, DocKind::Directory)?;
        let report = self.merge_and_resolve(batch);
        self.has_fetched_directory.store(true, Ordering::SeqCst);
        Ok(report)
    }

    /// Read a router file from `path`, and merge its relays into our list.
    pub fn load_from_file(&self, path: &Path, trusted: bool) -> Result<MergeReport> {
        let text = FileSource::new(path).load()?;
        self.load_from_string(&text, trusted)
    }

    /// Merge `batch` into our list, then resolve every relay in the result.
    ///
    /// If we have no list yet, `batch` becomes our list.
    fn merge_and_resolve(&self, batch: RouterList) -> MergeReport {
        self.list.write_with(|slot| {
            let (merged, report) = match slot.take() {
                Some(mut arc) => {
                    let report = Arc::make_mut(&mut arc).merge_batch(batch);
                    (arc, report)
                }
                None => {
                    let report = MergeReport {
                        inserted: batch.len(),
                        ..MergeReport::default()
                    };
                    (Arc::new(batch), report)
                }
            };
            let list = Arc::make_mut(slot.insert(merged));
            let dropped = resolve_pass(
                list,
                self.collab.resolver.as_ref(),
                self.collab.local_relay.as_ref(),
            );
            debug!(
                "Merged relays: {} new, {} replaced, {} refused; {} dropped after resolving; {} known.",
                report.inserted,
                report.superseded,
                report.rejected,
                dropped,
                list.len()
            );
            report
        })
    }

    /// Add a single relay to our list.
    ///
    /// Fails if we haven't loaded a list yet.
    pub fn add_relay(&self, relay: RelayRecord) -> Result<AddOutcome> {
        self.list.mutate(|list| Ok(list.merge(relay)))
    }

    /// Resolve the address of every relay in our list, dropping those that
    /// don't resolve.  Return the number of relays dropped.
    pub fn resolve_relays(&self) -> Result<usize> {
        self.list.mutate(|list| {
            Ok(resolve_pass(
                list,
                self.collab.resolver.as_ref(),
                self.collab.local_relay.as_ref(),
            ))
        })
    }

    /// Forget every relay whose descriptor is older than our configured
    /// maximum age, as of `now`.  Return the number of relays removed.
    pub fn remove_old_routers(&self, now: SystemTime) -> Result<usize> {
        let max_age = self.config.max_router_age();
        let removed = self
            .list
            .mutate(|list| Ok(list.evict_stale(max_age, now)))?;
        if removed > 0 {
            info!(
                "Removed {} relays with descriptors older than {}.",
                removed,
                humantime::format_duration(max_age)
            );
        }
        Ok(removed)
    }

    /// Apply a running-routers status to our list.
    pub fn apply_running_routers(&self, status: &RunningRouters) -> Result<RunningUpdateOutcome> {
        self.list.mutate(|list| Ok(list.apply_running_routers(status)))
    }

    /// Mark the relay with identity `id` as down.
    ///
    /// Return false if we don't know any such relay.
    pub fn mark_as_down(&self, id: &IdentityDigest) -> bool {
        self.list
            .mutate(|list| Ok(list.mark_as_down(id)))
            .unwrap_or(false)
    }

    /// Choose a random running relay.
    ///
    /// We try to use a relay named in `preferred`.  If none of those is
    /// available, we pick any running relay; if we accept connections from
    /// other relays, we only pick among relays we're connected to.  We never
    /// pick a relay named in `excluded` or listed in `exclusion`.
    pub fn choose_random_node<R>(
        &self,
        rng: &mut R,
        preferred: &str,
        excluded: &str,
        exclusion: RelayExclusion,
    ) -> Option<RelayRecord>
    where
        R: Rng + ?Sized,
    {
        let list = self.snapshot()?;
        let mut selector = NodeSelector::new()
            .prefer(preferred)
            .exclude_names(excluded)
            .exclude(exclusion)
            .warn_unknown_names(self.has_fetched_directory());
        if self.config.accept_relay_connections() {
            selector = selector.require_live_connection(self.collab.connections.as_ref());
        }
        selector.select(rng, &list).cloned()
    }

    /// Choose a random trusted directory server.
    ///
    /// If we can't find one, reload our trusted directory servers, from
    /// our configured router file or else from the built-in list, and try
    /// once more.
    ///
    /// Return an error only if that reload fails.
    pub fn pick_directory_server<R>(&self, rng: &mut R) -> Result<Option<RelayRecord>>
    where
        R: Rng + ?Sized,
    {
        if let Some(relay) = self.try_pick_directory_server(rng) {
            return Ok(Some(relay));
        }

        warn!("No dirservers known. Reloading and trying again.");
        self.has_fetched_directory.store(false, Ordering::SeqCst);
        self.list.write_with(|slot| {
            if let Some(arc) = slot {
                Arc::make_mut(arc).clear_trusted_directories();
            }
        });
        match self.config.router_file() {
            Some(path) => self.load_from_file(path, true)?,
            None => {
                let text = self.collab.default_dirservers.load()?;
                self.load_from_string(&text, true)?
            }
        };

        Ok(self.try_pick_directory_server(rng))
    }

    /// Make one attempt to choose a trusted directory server.
    fn try_pick_directory_server<R>(&self, rng: &mut R) -> Option<RelayRecord>
    where
        R: Rng + ?Sized,
    {
        // Usually a running server exists, and we only need to read.
        if let Some(relay) = self
            .snapshot()?
            .choose_running_directory(rng)
            .cloned()
        {
            return Some(relay);
        }
        self.list
            .mutate(|list| Ok(list.pick_directory_server(rng).cloned()))
            .ok()
            .flatten()
    }

    /// Return true if none of our trusted directory servers is running.
    pub fn all_directory_servers_down(&self) -> bool {
        self.snapshot()
            .is_none_or(|list| list.all_directory_servers_down())
    }

    /// Return true if every running relay would definitely refuse to exit to
    /// `addr`:`port`.
    pub fn all_routers_reject(&self, addr: Option<Ipv4Addr>, port: u16) -> bool {
        self.snapshot()
            .is_none_or(|list| list.all_routers_reject(addr, port))
    }
}
