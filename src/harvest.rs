//! Relay candidate harvesting.
//!
//! A relay channel allocation covers two consecutive ports: the requested
//! one carries media (RTP) and the next one its control channel (RTCP).
//! The first harvest call for a component performs the allocation and
//! returns the media candidate while keeping the companion endpoint pair
//! as pending state; the next call drains that state into the control
//! candidate without another network round-trip.
//!
//! Harvesting is one of several candidate sources feeding the same ICE
//! gathering pass, so nothing here may abort the caller: every failure is
//! logged and yields an empty candidate set.

use log::{debug, warn};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::lookup_host;
use tokio::sync::Mutex;

use jid::Jid;

use crate::candidate::{IceComponent, RelayedCandidate};
use crate::error::XmppError;
use crate::registry::RelayRegistry;
use crate::session::XmppSession;
use crate::stanza::{self, ChannelAllocation};

/// Companion endpoint pair scheduled by a successful allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAllocation {
    /// Relayed (public) endpoint of the companion channel.
    pub relayed: SocketAddr,
    /// Relay forwarding endpoint of the companion channel.
    pub forward: SocketAddr,
}

/// Produces relayed candidates for ICE components from registry nodes.
pub struct RelayHarvester {
    session: Arc<dyn XmppSession>,
    registry: Arc<RelayRegistry>,
    /// Pending companion allocation; the lock also serializes harvest
    /// calls, whose state spans two consecutive invocations.
    pending: Mutex<Option<PendingAllocation>>,
}

impl RelayHarvester {
    pub fn new(session: Arc<dyn XmppSession>, registry: Arc<RelayRegistry>) -> Self {
        Self {
            session,
            registry,
            pending: Mutex::new(None),
        }
    }

    /// Harvest one relayed candidate for `component`.
    ///
    /// The first call allocates a channel at the preferred relay node and
    /// offers the media candidate; the next call offers the control
    /// candidate from the pending companion pair. Only candidates the
    /// component actually kept are returned. The call never fails:
    /// allocation, addressing and socket errors are logged and produce an
    /// empty set so the other candidate sources keep gathering.
    pub async fn harvest(&self, component: &mut dyn IceComponent) -> Vec<RelayedCandidate> {
        let mut pending = self.pending.lock().await;
        let mut kept = Vec::new();

        if let Some(companion) = pending.take() {
            self.offer(component, companion.relayed, companion.forward, &mut kept)
                .await;
            return kept;
        }

        let Some(node) = self.registry.preferred().await else {
            debug!("no relay nodes known, nothing to harvest");
            return kept;
        };

        let allocation = match self.request_channel(&node.jid).await {
            Ok(allocation) => allocation,
            Err(err) => {
                debug!("channel request to {} failed: {err}", node.jid);
                return kept;
            }
        };
        if allocation.host.is_empty() || allocation.remote_port == 0 {
            warn!(
                "relay {} returned an unusable channel allocation {allocation:?}",
                node.jid
            );
            return kept;
        }

        let host = strip_zone(&allocation.host);
        let ip = match resolve_host(host, allocation.remote_port).await {
            Ok(ip) => ip,
            Err(err) => {
                warn!("cannot resolve relay host {host:?}: {err}");
                return kept;
            }
        };

        let relayed = SocketAddr::new(ip, allocation.remote_port);
        let forward = SocketAddr::new(ip, allocation.local_port);
        *pending = companion_of(relayed, forward);
        self.offer(component, relayed, forward, &mut kept).await;
        kept
    }

    async fn offer(
        &self,
        component: &mut dyn IceComponent,
        relayed: SocketAddr,
        forward: SocketAddr,
        kept: &mut Vec<RelayedCandidate>,
    ) {
        match RelayedCandidate::new(relayed, forward, component.component_id()).await {
            Ok(candidate) => {
                if component.add_local_candidate(candidate.clone()) {
                    kept.push(candidate);
                } else {
                    debug!("component discarded relayed candidate {relayed} as redundant");
                }
            }
            Err(err) => warn!("failed to open relayed candidate socket for {relayed}: {err}"),
        }
    }

    async fn request_channel(&self, relay: &Jid) -> Result<ChannelAllocation, XmppError> {
        let reply = self.session.send_iq(relay, stanza::channel_request()).await?;
        ChannelAllocation::from_element(&reply)
    }
}

/// The companion channel lives at the next sequential port pair. An
/// allocation at the very top of the port range has no companion.
fn companion_of(relayed: SocketAddr, forward: SocketAddr) -> Option<PendingAllocation> {
    match (relayed.port().checked_add(1), forward.port().checked_add(1)) {
        (Some(relayed_port), Some(forward_port)) => Some(PendingAllocation {
            relayed: SocketAddr::new(relayed.ip(), relayed_port),
            forward: SocketAddr::new(forward.ip(), forward_port),
        }),
        _ => {
            debug!("allocation at the top of the port range has no companion channel");
            None
        }
    }
}

/// Drop a `%zone` scope suffix from an address literal.
fn strip_zone(host: &str) -> &str {
    match host.find('%') {
        Some(at) => &host[..at],
        None => host,
    }
}

async fn resolve_host(host: &str, port: u16) -> io::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    lookup_host((host, port))
        .await?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses for relay host"))
}
