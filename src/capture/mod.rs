//! Packet interception
//!
//! A capture backend hands over raw frames tagged with a direction. Each
//! frame is reduced to a [`PacketDescriptor`] and decided by the engine.
//! Enforcing the decision is up to the backend; the AF_PACKET tap can only
//! observe, so its decisions are counted and logged.

mod af_packet;

pub use af_packet::AfPacketSocket;

use crate::dataplane::{Decision, Direction, Engine, PacketDescriptor};
use crate::protocol::ethernet::{ethertype, Frame};
use crate::protocol::ipv4::{self, Ipv4Header};
use crate::Result;
use std::future::Future;
use tracing::{debug, trace};

/// Largest frame the tap reads
pub const MAX_FRAME_LEN: usize = 65536;

/// Information about a received frame
#[derive(Debug, Clone)]
pub struct RxInfo {
    /// Number of bytes received
    pub len: usize,
    /// Direction relative to this host, if the frame is to or from it
    pub direction: Option<Direction>,
}

/// Packet capture backend trait
pub trait Capture: Send {
    /// Receive a frame into the provided buffer
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<RxInfo>> + Send;
}

/// Reduce an Ethernet frame to the fields the filter matches on.
///
/// Returns `None` for anything that is not IPv4. Protocols without ports,
/// and fragments after the first, get ports of 0.
pub fn describe_frame(frame: &[u8], direction: Direction) -> Option<PacketDescriptor> {
    let eth = Frame::parse(frame).ok()?;
    if eth.ethertype() != ethertype::IPV4 {
        return None;
    }
    describe_ipv4(eth.payload(), direction)
}

/// Reduce an IPv4 packet to the fields the filter matches on
pub fn describe_ipv4(packet: &[u8], direction: Direction) -> Option<PacketDescriptor> {
    let ip = Ipv4Header::parse(packet).ok()?;
    let protocol = ip.protocol();

    let has_ports = matches!(protocol, ipv4::protocol::TCP | ipv4::protocol::UDP);
    let (src_port, dst_port) = if has_ports && ip.is_first_fragment() {
        ipv4::transport_ports_raw(ip.payload()).ok()?
    } else {
        (0, 0)
    };

    Some(PacketDescriptor {
        direction,
        protocol,
        src_addr: ip.src_addr_raw(),
        dst_addr: ip.dst_addr_raw(),
        src_port,
        dst_port,
    })
}

/// Feed every frame from `capture` through the engine until a receive
/// error occurs.
pub async fn run_tap<C: Capture>(capture: &mut C, engine: &Engine) -> Result<()> {
    let mut buf = vec![0u8; MAX_FRAME_LEN];

    loop {
        let rx = capture.recv(&mut buf).await?;
        let Some(direction) = rx.direction else {
            continue;
        };

        match describe_frame(&buf[..rx.len], direction) {
            Some(packet) => {
                if engine.decide(&packet) == Decision::Drop {
                    debug!(
                        ?direction,
                        protocol = packet.protocol,
                        "tap observed packet that policy drops"
                    );
                }
            }
            None => trace!(len = rx.len, "skipping non-IPv4 frame"),
        }
    }
}
