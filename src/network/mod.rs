pub mod link;
pub mod packet;

pub use link::{Endpoint, Link, LinkStats, Side};
pub use packet::{Destination, Packet, PacketKind};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Where a packet enters or leaves a node.
///
/// `Local` is the virtual loopback (always up, zero cost). `Unknown` means
/// "no route" and forces a drop when used to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Local,
    Unknown,
    Port(usize),
}

impl Interface {
    pub fn port(self) -> Option<usize> {
        match self {
            Interface::Port(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interface::Local => write!(f, "local"),
            Interface::Unknown => write!(f, "unknown"),
            Interface::Port(n) => write!(f, "{}", n),
        }
    }
}

/// Routing metric conventions offered by `NodeContext::interface_weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMetric {
    /// Every hop costs 1 (RIP style).
    Flat,
    /// 3 up to 1 Mbps, 2 up to 10 Mbps, 1 above.
    BandwidthTier,
    /// 10^9 / bandwidth, i.e. relative to a 1 Gbps reference (OSPF style).
    InverseBandwidth,
}

impl RoutingMetric {
    pub fn weight(self, bandwidth_bps: u64) -> u64 {
        match self {
            RoutingMetric::Flat => 1,
            RoutingMetric::BandwidthTier => {
                if bandwidth_bps <= 1_000_000 {
                    3
                } else if bandwidth_bps <= 10_000_000 {
                    2
                } else {
                    1
                }
            }
            RoutingMetric::InverseBandwidth => 1_000_000_000 / bandwidth_bps.max(1),
        }
    }
}
