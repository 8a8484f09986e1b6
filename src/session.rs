//! Collaborator seam to the XMPP connection.

use async_trait::async_trait;
use jid::Jid;
use minidom::Element;

use crate::error::XmppError;

/// Narrow view of a live XMPP session.
///
/// The connection itself, reply tracking, and timeouts belong to the
/// transport library. This layer only needs a connectivity check,
/// addressing, the currently-available roster presences, and a single
/// get-IQ round-trip. Implementations are expected to enforce their own
/// reply timeout on [`send_iq`](Self::send_iq) (conventionally a multiple
/// of the library-wide default) and to surface every failure as one of the
/// [`XmppError`] categories.
#[async_trait]
pub trait XmppSession: Send + Sync {
    /// Whether the session is currently connected and authenticated.
    fn is_connected(&self) -> bool;

    /// The account's server domain, target of domain item discovery.
    fn server_domain(&self) -> Jid;

    /// The host the session is connected to, probed as a discovery
    /// fallback. This is a raw connection string and may not be a valid
    /// JID.
    fn server_host(&self) -> String;

    /// JIDs of currently-available roster presences.
    fn available_buddies(&self) -> Vec<Jid>;

    /// Send a get-IQ with `payload` to `to` and return the reply payload.
    async fn send_iq(&self, to: &Jid, payload: Element) -> Result<Element, XmppError>;
}
