//! Jingle Nodes (XEP-0278) UDP relay support for XMPP media sessions.
//!
//! Servers and peers on an XMPP network can advertise UDP relay services
//! for NAT traversal. This crate finds those services and turns their
//! channel allocations into relayed ICE candidates.
//!
//! # Architecture
//!
//! - [`RelayDiscovery`]: bounded recursive search for relay nodes over
//!   trackers, server domain items, the server host, and roster buddies
//! - [`RelayRegistry`]: shared registry of discovered relay nodes
//! - [`RelayHarvester`]: channel allocation at the preferred node, one
//!   relayed candidate per harvest call
//! - [`RelayedCandidate`] & [`RelayCandidateSocket`]: the candidate and
//!   its datagram socket, redirecting outbound traffic to the relay and
//!   tracking inbound RTP loss
//! - [`XmppSession`] & [`IceComponent`]: the seams to the XMPP connection
//!   and the ICE engine
//!
//! # Protocol Overview
//!
//! 1. Query configured trackers and discoverable services for
//!    `<services/>` lists; collect `<relay/>` entries, recurse into
//!    `<tracker/>` entries
//! 2. Ask the preferred relay for a UDP `<channel/>`; the reply carries
//!    the relayed host, a public port and a forwarding port
//! 3. Wrap the allocation in a candidate socket; the companion control
//!    channel sits one port above and becomes the next harvested
//!    candidate
//! 4. Send media at the relay's forwarding endpoint; the relay re-emits
//!    it from the relayed address

pub mod candidate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod harvest;
pub mod loss;
pub mod registry;
pub mod session;
pub mod socket;
pub mod stanza;

pub use candidate::{COMPONENT_RTCP, COMPONENT_RTP, IceComponent, RelayedCandidate};
pub use config::DiscoveryConfig;
pub use discovery::RelayDiscovery;
pub use error::XmppError;
pub use harvest::{PendingAllocation, RelayHarvester};
pub use loss::{LossReport, LossTracker};
pub use registry::{RelayNode, RelayRegistry};
pub use session::XmppSession;
pub use socket::RelayCandidateSocket;
pub use stanza::{ChannelAllocation, DiscoItem, TrackerEntry, TrackerEntryKind};
