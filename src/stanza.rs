//! Jingle Nodes (XEP-0278) and service-discovery IQ payloads.
//!
//! Wire format:
//! ```xml
//! <!-- Channel request -->
//! <channel xmlns='http://jabber.org/protocol/jinglenodes#channel' protocol='udp'/>
//!
//! <!-- Channel response -->
//! <channel xmlns='http://jabber.org/protocol/jinglenodes#channel'
//!          protocol='udp' host='178.33.112.31' remoteport='22444' localport='22445'/>
//!
//! <!-- Tracker request -->
//! <services xmlns='http://jabber.org/protocol/jinglenodes'/>
//!
//! <!-- Tracker response -->
//! <services xmlns='http://jabber.org/protocol/jinglenodes'>
//!   <relay policy='public' address='relay.montague.example' protocol='udp'/>
//!   <tracker policy='public' address='tracker.capulet.example' protocol='udp'/>
//! </services>
//! ```

use jid::Jid;
use log::debug;
use minidom::Element;

use crate::error::XmppError;

/// Namespace of tracker queries and their relay/tracker entries.
pub const NS_JINGLE_NODES: &str = "http://jabber.org/protocol/jinglenodes";
/// Namespace of relay channel allocation requests.
pub const NS_JINGLE_NODES_CHANNEL: &str = "http://jabber.org/protocol/jinglenodes#channel";
/// Namespace of service-discovery item queries.
pub const NS_DISCO_ITEMS: &str = "http://jabber.org/protocol/disco#items";
/// The only transport protocol channels are allocated for here.
pub const PROTOCOL_UDP: &str = "udp";

/// Build a UDP channel allocation request payload.
pub fn channel_request() -> Element {
    Element::builder("channel", NS_JINGLE_NODES_CHANNEL)
        .attr("protocol", PROTOCOL_UDP)
        .build()
}

/// A relay channel allocation returned by a relay node.
///
/// `remote_port` is the public port remote peers send to; `local_port` is
/// the relay port the allocating client forwards its own media to. The two
/// ports of the companion control channel sit directly above these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAllocation {
    pub host: String,
    pub remote_port: u16,
    pub local_port: u16,
}

impl ChannelAllocation {
    /// Parse a channel response payload.
    ///
    /// Attribute values are taken as-is: an absent host reads as empty and
    /// absent or unparsable ports read as 0. Deciding whether those values
    /// are usable is the caller's job; only a wrong tag or namespace is an
    /// error here.
    pub fn from_element(element: &Element) -> Result<Self, XmppError> {
        if !element.is("channel", NS_JINGLE_NODES_CHANNEL) {
            return Err(XmppError::Malformed(format!(
                "expected channel element, got <{}>",
                element.name()
            )));
        }

        Ok(Self {
            host: element.attr("host").unwrap_or_default().to_owned(),
            remote_port: port_attr(element, "remoteport"),
            local_port: port_attr(element, "localport"),
        })
    }
}

fn port_attr(element: &Element, name: &str) -> u16 {
    element
        .attr(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Build a tracker service-list request payload.
pub fn services_request() -> Element {
    Element::builder("services", NS_JINGLE_NODES).build()
}

/// What a tracker entry offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEntryKind {
    /// The entry grants channel allocations itself.
    Relay,
    /// The entry knows further relays and trackers and can be searched.
    Tracker,
}

/// One entry of a tracker service list.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerEntry {
    pub kind: TrackerEntryKind,
    pub jid: Jid,
    /// Transport protocol advertised for the entry (`udp` when absent).
    pub protocol: String,
}

/// Parse a tracker service-list response payload.
///
/// Entries with a missing or unparsable address are logged and skipped;
/// child tags other than `relay`/`tracker` are ignored.
pub fn parse_services(element: &Element) -> Result<Vec<TrackerEntry>, XmppError> {
    if !element.is("services", NS_JINGLE_NODES) {
        return Err(XmppError::Malformed(format!(
            "expected services element, got <{}>",
            element.name()
        )));
    }

    let mut entries = Vec::new();
    for child in element.children() {
        let kind = if child.is("relay", NS_JINGLE_NODES) {
            TrackerEntryKind::Relay
        } else if child.is("tracker", NS_JINGLE_NODES) {
            TrackerEntryKind::Tracker
        } else {
            continue;
        };

        let address = child.attr("address").unwrap_or_default();
        match Jid::new(address) {
            Ok(jid) => entries.push(TrackerEntry {
                kind,
                jid,
                protocol: child.attr("protocol").unwrap_or(PROTOCOL_UDP).to_owned(),
            }),
            Err(err) => debug!(
                "skipping {} entry with bad address {address:?}: {err}",
                child.name()
            ),
        }
    }

    Ok(entries)
}

/// Build a disco#items query payload.
pub fn disco_items_request() -> Element {
    Element::builder("query", NS_DISCO_ITEMS).build()
}

/// One discoverable item under a queried entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoItem {
    pub jid: Jid,
    pub name: Option<String>,
}

/// Parse a disco#items response payload.
///
/// Items with a missing or unparsable JID are logged and skipped.
pub fn parse_disco_items(element: &Element) -> Result<Vec<DiscoItem>, XmppError> {
    if !element.is("query", NS_DISCO_ITEMS) {
        return Err(XmppError::Malformed(format!(
            "expected disco#items query element, got <{}>",
            element.name()
        )));
    }

    let mut items = Vec::new();
    for child in element.children() {
        if !child.is("item", NS_DISCO_ITEMS) {
            continue;
        }

        let raw = child.attr("jid").unwrap_or_default();
        match Jid::new(raw) {
            Ok(jid) => items.push(DiscoItem {
                jid,
                name: child.attr("name").map(str::to_owned),
            }),
            Err(err) => debug!("skipping disco item with bad jid {raw:?}: {err}"),
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_request_shape() {
        let request = channel_request();

        assert!(request.is("channel", NS_JINGLE_NODES_CHANNEL));
        assert_eq!(request.attr("protocol"), Some(PROTOCOL_UDP));
    }

    #[test]
    fn test_channel_allocation_parse() {
        let response: Element =
            "<channel xmlns='http://jabber.org/protocol/jinglenodes#channel' \
             protocol='udp' host='178.33.112.31' remoteport='22444' localport='22445'/>"
                .parse()
                .unwrap();

        let allocation = ChannelAllocation::from_element(&response).unwrap();

        assert_eq!(allocation.host, "178.33.112.31");
        assert_eq!(allocation.remote_port, 22444);
        assert_eq!(allocation.local_port, 22445);
    }

    #[test]
    fn test_channel_allocation_missing_attrs_read_as_empty() {
        let response: Element =
            "<channel xmlns='http://jabber.org/protocol/jinglenodes#channel' remoteport='nope'/>"
                .parse()
                .unwrap();

        let allocation = ChannelAllocation::from_element(&response).unwrap();

        assert_eq!(allocation.host, "");
        assert_eq!(allocation.remote_port, 0);
        assert_eq!(allocation.local_port, 0);
    }

    #[test]
    fn test_channel_allocation_rejects_wrong_element() {
        let response: Element = "<services xmlns='http://jabber.org/protocol/jinglenodes'/>"
            .parse()
            .unwrap();

        assert!(matches!(
            ChannelAllocation::from_element(&response),
            Err(XmppError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_services_splits_relays_and_trackers() {
        let response: Element = "<services xmlns='http://jabber.org/protocol/jinglenodes'>\
             <relay policy='public' address='relay.montague.example' protocol='udp'/>\
             <tracker policy='public' address='tracker.capulet.example' protocol='udp'/>\
             <other address='ignored.example'/>\
             </services>"
            .parse()
            .unwrap();

        let entries = parse_services(&response).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, TrackerEntryKind::Relay);
        assert_eq!(entries[0].jid.to_string(), "relay.montague.example");
        assert_eq!(entries[0].protocol, "udp");
        assert_eq!(entries[1].kind, TrackerEntryKind::Tracker);
        assert_eq!(entries[1].jid.to_string(), "tracker.capulet.example");
    }

    #[test]
    fn test_parse_services_skips_bad_addresses() {
        let response: Element = "<services xmlns='http://jabber.org/protocol/jinglenodes'>\
             <relay policy='public' address='' protocol='udp'/>\
             <relay policy='public' address='relay.montague.example' protocol='udp'/>\
             </services>"
            .parse()
            .unwrap();

        let entries = parse_services(&response).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].jid.to_string(), "relay.montague.example");
    }

    #[test]
    fn test_parse_disco_items() {
        let response: Element = "<query xmlns='http://jabber.org/protocol/disco#items'>\
             <item jid='jn.example.org' name='Jingle Nodes'/>\
             <item jid='conference.example.org'/>\
             </query>"
            .parse()
            .unwrap();

        let items = parse_disco_items(&response).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].jid.to_string(), "jn.example.org");
        assert_eq!(items[0].name.as_deref(), Some("Jingle Nodes"));
        assert_eq!(items[1].name, None);
    }

    #[test]
    fn test_parse_disco_items_rejects_wrong_namespace() {
        let response: Element = "<query xmlns='http://jabber.org/protocol/disco#info'/>"
            .parse()
            .unwrap();

        assert!(matches!(
            parse_disco_items(&response),
            Err(XmppError::Malformed(_))
        ));
    }
}
