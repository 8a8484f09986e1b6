//! Stanza-exchange error taxonomy.

use thiserror::Error;

/// Failure categories for a stanza exchange with the server or a peer.
///
/// The transport library distinguishes many more failure types; this layer
/// only cares about the category, because every category gets the same
/// treatment during discovery and harvesting: log it and move on with an
/// empty probe result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmppError {
    /// The session is not connected.
    #[error("session not connected")]
    NotConnected,

    /// The target did not answer within the reply timeout.
    #[error("no response from {0}")]
    NoResponse(String),

    /// The exchange was interrupted before a reply arrived.
    #[error("exchange interrupted")]
    Interrupted,

    /// The target answered with an error stanza.
    #[error("error reply from {0}: {1}")]
    ErrorReply(String, String),

    /// The reply payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}
