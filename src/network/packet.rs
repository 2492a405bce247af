use super::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a packet with no payload, similar to an IP header.
pub const HEADER_SIZE: usize = 20;
pub const INITIAL_TTL: u32 = 32;
/// A packet arriving with this TTL is dropped instead of delivered or forwarded.
pub const TTL_EXPIRY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Data,
    Control,
    Tracing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Node(NodeId),
    /// Addressed to whichever node receives it next.
    FirstHop,
}

impl Destination {
    pub fn is(self, node: NodeId) -> bool {
        match self {
            Destination::Node(id) => id == node,
            Destination::FirstHop => false,
        }
    }
}

impl From<NodeId> for Destination {
    fn from(id: NodeId) -> Self {
        Destination::Node(id)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Node(id) => write!(f, "{}", id),
            Destination::FirstHop => write!(f, "first-hop"),
        }
    }
}

/// A network packet. Cloning yields a fresh logical packet carrying the
/// same payload, TTL and sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    source: NodeId,
    destination: Destination,
    ttl: u32,
    sequence: u64,
    kind: PacketKind,
    payload: Vec<u8>,
    size: usize,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        source: NodeId,
        destination: impl Into<Destination>,
        payload: Vec<u8>,
    ) -> Self {
        let size = HEADER_SIZE + payload.len();
        Self {
            source,
            destination: destination.into(),
            ttl: INITIAL_TTL,
            sequence: 0,
            kind,
            payload,
            size,
        }
    }

    pub fn data(source: NodeId, destination: impl Into<Destination>, payload: Vec<u8>) -> Self {
        Self::new(PacketKind::Data, source, destination, payload)
    }

    pub fn control(source: NodeId, destination: impl Into<Destination>, payload: Vec<u8>) -> Self {
        Self::new(PacketKind::Control, source, destination, payload)
    }

    pub fn tracing(source: NodeId, destination: impl Into<Destination>) -> Self {
        Self::new(PacketKind::Tracing, source, destination, Vec::new())
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.ttl <= TTL_EXPIRY
    }

    pub(crate) fn decrement_ttl(&mut self) {
        self.ttl = self.ttl.saturating_sub(1);
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Header plus payload, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn size_bits(&self) -> u64 {
        self.size as u64 * 8
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
        self.size = HEADER_SIZE + self.payload.len();
    }

    pub fn append_payload(&mut self, bytes: &[u8]) {
        self.payload.extend_from_slice(bytes);
        self.size = HEADER_SIZE + self.payload.len();
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "src {} dst {} type {:?} ttl {} seq {} size {}",
            self.source, self.destination, self.kind, self.ttl, self.sequence, self.size
        )?;
        if self.kind == PacketKind::Tracing {
            write!(f, " path{}", self.payload_text())?;
        }
        Ok(())
    }
}
