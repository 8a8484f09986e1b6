//! Shared registry of known relay nodes.

use jid::Jid;
use tokio::sync::RwLock;

/// A node known to grant relay channel allocations.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayNode {
    pub jid: Jid,
    /// Transport protocol the node advertised.
    pub protocol: String,
}

/// Registry shared between discovery (writer) and harvesting (reader).
///
/// Readers observe whatever the latest completed discovery run wrote; no
/// stronger isolation is needed because relay allocation is best-effort
/// and repeated per harvest call. Nodes are kept in first-seen order so
/// operator-configured trackers stay ahead of auto-discovered ones.
#[derive(Debug, Default)]
pub struct RelayRegistry {
    nodes: RwLock<Vec<RelayNode>>,
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node harvesting should ask first.
    pub async fn preferred(&self) -> Option<RelayNode> {
        self.nodes.read().await.first().cloned()
    }

    /// All known nodes, in preference order.
    pub async fn nodes(&self) -> Vec<RelayNode> {
        self.nodes.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Merge newly discovered nodes, keeping first-seen order and dropping
    /// duplicates by JID.
    pub async fn merge(&self, discovered: Vec<RelayNode>) {
        let mut nodes = self.nodes.write().await;
        for node in discovered {
            if !nodes.iter().any(|known| known.jid == node.jid) {
                nodes.push(node);
            }
        }
    }
}
