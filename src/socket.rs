//! Relayed candidate datagram socket.
//!
//! Upper layers treat this as a plain UDP socket bound at the relayed
//! address. In reality the socket is bound to an ephemeral local port and
//! every outgoing datagram is redirected to the relay's forwarding
//! endpoint, which re-emits it from the relayed address; the requested
//! destination is ignored because the relay decides where the channel
//! forwards. Inbound datagrams that are not STUN/TURN control traffic are
//! assumed to be RTP and feed loss accounting.

use log::{debug, warn};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use crate::loss::{LossReport, LossTracker};

/// RTP version encoded in the top two bits of the first header byte.
/// STUN starts with 0b00 and TURN channel data with 0b01, which is what
/// makes the demux possible at the byte level.
const RTP_VERSION: u8 = 2;
/// Byte offset of the big-endian RTP sequence number.
const RTP_SEQ_OFFSET: usize = 2;
/// Fixed part of the RTP header; shorter packets are never inspected.
const RTP_HEADER_LEN: usize = 12;

/// Datagram socket backing one relayed candidate.
#[derive(Debug)]
pub struct RelayCandidateSocket {
    socket: UdpSocket,
    relayed_addr: SocketAddr,
    forward_addr: SocketAddr,
    loss: Mutex<LossTracker>,
}

impl RelayCandidateSocket {
    /// Bind an ephemeral local socket for a channel allocation.
    ///
    /// `relayed_addr` is the public endpoint the relay re-emits from and
    /// the address this socket reports as local; `forward_addr` is the
    /// relay endpoint all outbound traffic is sent to.
    pub async fn bind(relayed_addr: SocketAddr, forward_addr: SocketAddr) -> io::Result<Self> {
        let any: IpAddr = if forward_addr.is_ipv6() {
            Ipv6Addr::UNSPECIFIED.into()
        } else {
            Ipv4Addr::UNSPECIFIED.into()
        };
        let socket = UdpSocket::bind(SocketAddr::new(any, 0)).await?;
        debug!(
            "relayed candidate {relayed_addr} bound at {}, forwarding via {forward_addr}",
            socket.local_addr()?
        );

        Ok(Self {
            socket,
            relayed_addr,
            forward_addr,
            loss: Mutex::new(LossTracker::new()),
        })
    }

    /// The address upper layers should see: the relayed endpoint, not the
    /// underlying bind address.
    pub fn local_addr(&self) -> SocketAddr {
        self.relayed_addr
    }

    /// The relay endpoint outbound traffic is redirected to.
    pub fn forward_addr(&self) -> SocketAddr {
        self.forward_addr
    }

    /// Send a datagram through the relay. The requested destination is
    /// ignored; payload, offset and length pass through unchanged.
    pub async fn send_to(&self, buf: &[u8], _dest: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, self.forward_addr).await
    }

    /// Receive a datagram, accounting for RTP loss on the way through.
    /// I/O failures propagate to the caller unchanged.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let (len, from) = self.socket.recv_from(buf).await?;
        self.inspect(&buf[..len]).await;
        Ok((len, from))
    }

    /// Current loss counters.
    pub async fn loss_stats(&self) -> LossReport {
        let loss = self.loss.lock().await;
        LossReport {
            lost: loss.lost(),
            received: loss.received(),
        }
    }

    async fn inspect(&self, packet: &[u8]) {
        if !is_rtp(packet) {
            return;
        }

        let seq = u16::from_be_bytes([packet[RTP_SEQ_OFFSET], packet[RTP_SEQ_OFFSET + 1]]);
        if let Some(report) = self.loss.lock().await.record(seq, Instant::now()) {
            warn!(
                "lossy relay path via {}: {} lost / {} received ({:.1}%)",
                self.forward_addr,
                report.lost,
                report.received,
                report.ratio() * 100.0
            );
        }
    }
}

fn is_rtp(packet: &[u8]) -> bool {
    packet.len() >= RTP_HEADER_LEN && packet[0] >> 6 == RTP_VERSION
}
