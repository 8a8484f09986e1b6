//! Relay service discovery.
//!
//! Finds nodes on the XMPP network that grant relay channel allocations:
//! operator-configured trackers first, then (optionally) a prioritized
//! walk over the server domain's discoverable items, the server host
//! itself, and currently-available roster buddies. Found relays are
//! merged into the shared registry when the run completes.
//!
//! A run never fails. Every probe error (not connected, no response,
//! interrupted, error reply, malformed payload) degrades to an empty
//! probe result, so a flaky tracker can only cost coverage, never the
//! run.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use jid::Jid;

use crate::config::DiscoveryConfig;
use crate::error::XmppError;
use crate::registry::{RelayNode, RelayRegistry};
use crate::session::XmppSession;
use crate::stanza::{self, DiscoItem, TrackerEntry, TrackerEntryKind};

/// Accumulator threaded through one discovery run.
struct SearchState {
    visited: HashSet<Jid>,
    found: Vec<RelayNode>,
    probes: usize,
}

/// Discovers relay nodes for one account and feeds the shared registry.
pub struct RelayDiscovery {
    session: Arc<dyn XmppSession>,
    registry: Arc<RelayRegistry>,
    config: DiscoveryConfig,
    /// Serializes runs; a second caller waits for the in-flight run.
    run_lock: Mutex<()>,
}

impl RelayDiscovery {
    pub fn new(
        session: Arc<dyn XmppSession>,
        registry: Arc<RelayRegistry>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            session,
            registry,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Execute one discovery pass and merge the outcome into the registry.
    ///
    /// Returns the number of relay nodes this run found. Intended to run
    /// off the caller's main path (spawned as a background task); never
    /// returns an error.
    pub async fn run(&self) -> usize {
        let _serialized = self.run_lock.lock().await;

        if !self.session.is_connected() {
            debug!("skipping relay discovery: session not connected");
            return 0;
        }

        let mut search = SearchState {
            visited: HashSet::new(),
            found: Vec::new(),
            probes: 0,
        };

        for tracker in self.config.trackers.clone() {
            self.deep_search(tracker, self.config.max_depth, &mut search)
                .await;
        }

        if self.config.auto_discover {
            self.search_domain(&mut search).await;
        }

        let found = search.found.len();
        if found > 0 {
            info!(
                "relay discovery found {found} node(s) after probing {} node(s)",
                search.probes
            );
        } else {
            debug!(
                "relay discovery found no nodes after probing {} node(s)",
                search.probes
            );
        }
        self.registry.merge(search.found).await;
        found
    }

    /// Prioritized walk of the server domain: prefixed items first (with
    /// an optional stop after the first one), then the remaining items in
    /// listing order, the server host as a fallback, and finally the
    /// available buddies.
    async fn search_domain(&self, search: &mut SearchState) {
        let domain = self.session.server_domain();
        let items = match self.discover_items(&domain).await {
            Ok(items) => items,
            Err(err) => {
                debug!("item discovery under {domain} failed: {err}");
                Vec::new()
            }
        };

        let matches_prefix = |item: &&DiscoItem| {
            self.config
                .prefixes
                .iter()
                .any(|prefix| item.jid.to_string().starts_with(prefix.as_str()))
        };

        for item in items.iter().filter(matches_prefix) {
            self.deep_search(item.jid.clone(), self.config.max_depth, search)
                .await;
            if self.config.stop_on_first {
                debug!("stopping discovery after first prefixed item {}", item.jid);
                return;
            }
        }

        for item in items.iter().filter(|item| !matches_prefix(item)) {
            if !search.visited.contains(&item.jid) {
                self.deep_search(item.jid.clone(), self.config.max_depth, search)
                    .await;
            }
        }

        // Fallback: the host the session is connected to, which may not
        // form a valid JID.
        let host = self.session.server_host();
        match Jid::new(&host) {
            Ok(host_jid) => {
                self.deep_search(host_jid, self.config.max_depth, search)
                    .await;
            }
            Err(err) => warn!("ignoring malformed server host {host:?}: {err}"),
        }

        if self.config.search_buddies {
            for buddy in self.session.available_buddies() {
                self.deep_search(buddy, self.config.max_depth, search).await;
            }
        }
    }

    /// Depth-bounded tracker walk. Relay entries accumulate, tracker
    /// entries recurse; the visited set breaks cycles and keeps any node
    /// from being probed twice in a run.
    async fn deep_search(&self, target: Jid, depth: u32, search: &mut SearchState) {
        if depth == 0
            || search.found.len() >= self.config.max_entries
            || search.probes >= self.config.max_probes
            || !search.visited.insert(target.clone())
        {
            return;
        }
        search.probes += 1;

        let entries = match self.query_tracker(&target).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!("tracker query to {target} failed: {err}");
                return;
            }
        };

        for entry in entries {
            match entry.kind {
                TrackerEntryKind::Relay => {
                    if search.found.len() < self.config.max_entries
                        && !search.found.iter().any(|node| node.jid == entry.jid)
                    {
                        debug!("found relay node {}", entry.jid);
                        search.found.push(RelayNode {
                            jid: entry.jid,
                            protocol: entry.protocol,
                        });
                    }
                }
                TrackerEntryKind::Tracker => {
                    Box::pin(self.deep_search(entry.jid, depth - 1, search)).await;
                }
            }
        }
    }

    async fn query_tracker(&self, to: &Jid) -> Result<Vec<TrackerEntry>, XmppError> {
        let reply = self.session.send_iq(to, stanza::services_request()).await?;
        stanza::parse_services(&reply)
    }

    async fn discover_items(&self, to: &Jid) -> Result<Vec<DiscoItem>, XmppError> {
        let reply = self
            .session
            .send_iq(to, stanza::disco_items_request())
            .await?;
        stanza::parse_disco_items(&reply)
    }
}
