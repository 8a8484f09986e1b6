//! Relayed ICE candidates and the engine-facing component seam.

use rand::Rng;
use rand::distr::Alphanumeric;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::socket::RelayCandidateSocket;

/// ICE component id of the media (RTP) channel.
pub const COMPONENT_RTP: u16 = 1;
/// ICE component id of the companion control (RTCP) channel.
pub const COMPONENT_RTCP: u16 = 2;

/// Relayed candidates carry the lowest type preference (RFC 8445 4.1.2.2).
const RELAY_TYPE_PREFERENCE: u32 = 0;
/// Single-address host: highest local preference.
const LOCAL_PREFERENCE: u32 = 65535;

/// A local candidate whose transport address lives at the relay.
///
/// The candidate owns exactly one datagram socket (shared by `Arc` with
/// whatever the engine keeps); dropping the last handle tears the
/// allocation's local side down.
#[derive(Debug, Clone)]
pub struct RelayedCandidate {
    id: String,
    component_id: u16,
    relayed_addr: SocketAddr,
    socket: Arc<RelayCandidateSocket>,
}

impl RelayedCandidate {
    /// Open the backing socket for an allocated endpoint pair and wrap it
    /// as a candidate.
    pub async fn new(
        relayed_addr: SocketAddr,
        forward_addr: SocketAddr,
        component_id: u16,
    ) -> io::Result<Self> {
        let socket = RelayCandidateSocket::bind(relayed_addr, forward_addr).await?;

        Ok(Self {
            id: generate_candidate_id(),
            component_id,
            relayed_addr,
            socket: Arc::new(socket),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Component id (1 = RTP, 2 = RTCP).
    pub fn component_id(&self) -> u16 {
        self.component_id
    }

    /// The relayed transport address advertised to peers.
    pub fn addr(&self) -> SocketAddr {
        self.relayed_addr
    }

    /// The socket carrying this candidate's traffic.
    pub fn socket(&self) -> Arc<RelayCandidateSocket> {
        Arc::clone(&self.socket)
    }

    /// RFC 8445 candidate priority with the relay type preference.
    pub fn priority(&self) -> u32 {
        (1 << 24) * RELAY_TYPE_PREFERENCE
            + (1 << 8) * LOCAL_PREFERENCE
            + (256 - u32::from(self.component_id))
    }
}

impl fmt::Display for RelayedCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relay {} component {} via {}",
            self.relayed_addr,
            self.component_id,
            self.socket.forward_addr()
        )
    }
}

fn generate_candidate_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("candidate:{suffix}")
}

/// One ICE media component as seen by this layer.
///
/// The engine owns candidate bookkeeping and deduplication;
/// [`add_local_candidate`](Self::add_local_candidate) reports whether the
/// offered candidate was kept or discarded as redundant.
pub trait IceComponent: Send {
    /// Component id (1 = RTP, 2 = RTCP).
    fn component_id(&self) -> u16;

    /// Offer a candidate; `false` means the engine discarded it.
    fn add_local_candidate(&mut self, candidate: RelayedCandidate) -> bool;
}
