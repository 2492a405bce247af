use crate::network::{Interface, NodeId, Packet};
use crate::node::Plane;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    // administrative, resolved by the simulator as soon as they are due
    Traceroute,
    LinkUp,
    LinkDown,
    DumpRoutes,
    DumpControlState,
    DumpAppState,
    DumpPacketStats,

    // node-addressed, handed to the target node's input queue
    ControlTimeout,
    AppTimeout,
    ControlClockTick,
    AppClockTick,
    DeliverPacket,
}

impl EventKind {
    pub fn timeout(plane: Plane) -> Self {
        match plane {
            Plane::Control => EventKind::ControlTimeout,
            Plane::Application => EventKind::AppTimeout,
        }
    }

    pub fn clock_tick(plane: Plane) -> Self {
        match plane {
            Plane::Control => EventKind::ControlClockTick,
            Plane::Application => EventKind::AppClockTick,
        }
    }

    pub fn is_administrative(self) -> bool {
        matches!(
            self,
            EventKind::Traceroute
                | EventKind::LinkUp
                | EventKind::LinkDown
                | EventKind::DumpRoutes
                | EventKind::DumpControlState
                | EventKind::DumpAppState
                | EventKind::DumpPacketStats
        )
    }
}

/// A scheduled occurrence. The event owns its packet until delivery.
///
/// `sequence` is assigned by the `EventQueue` when the event is enqueued and
/// only breaks ties between events due at the same time.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub time: u64,
    pub sequence: u64,
    pub node: Option<NodeId>,
    pub interface: Option<Interface>,
    pub args: Vec<String>,
    pub packet: Option<Packet>,
}

impl Event {
    pub fn new(kind: EventKind, time: u64) -> Self {
        Self {
            kind,
            time,
            sequence: 0,
            node: None,
            interface: None,
            args: Vec::new(),
            packet: None,
        }
    }

    /// Administrative event carrying its operands as strings.
    pub fn administrative(kind: EventKind, time: u64, args: Vec<String>) -> Self {
        Self {
            args,
            ..Self::new(kind, time)
        }
    }

    pub fn delivery(time: u64, packet: Packet, node: NodeId, interface: Interface) -> Self {
        Self::new(EventKind::DeliverPacket, time)
            .for_node(node, interface)
            .with_packet(packet)
    }

    pub fn for_node(mut self, node: NodeId, interface: Interface) -> Self {
        self.node = Some(node);
        self.interface = Some(interface);
        self
    }

    pub fn with_packet(mut self, packet: Packet) -> Self {
        self.packet = Some(packet);
        self
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {} #{}", self.kind, self.time, self.sequence)?;
        if let Some(node) = self.node {
            write!(f, " node {}", node)?;
        }
        if let Some(interface) = self.interface {
            write!(f, " iface {}", interface)?;
        }
        if !self.args.is_empty() {
            write!(f, " args [{}]", self.args.join(" "))?;
        }
        if let Some(packet) = &self.packet {
            write!(f, " packet ({})", packet)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_classification() {
        assert!(EventKind::Traceroute.is_administrative());
        assert!(EventKind::LinkDown.is_administrative());
        assert!(EventKind::DumpPacketStats.is_administrative());
        assert!(!EventKind::DeliverPacket.is_administrative());
        assert!(!EventKind::AppTimeout.is_administrative());
        assert!(!EventKind::ControlClockTick.is_administrative());
    }

    #[test]
    fn test_plane_kinds() {
        assert_eq!(EventKind::timeout(Plane::Control), EventKind::ControlTimeout);
        assert_eq!(EventKind::timeout(Plane::Application), EventKind::AppTimeout);
        assert_eq!(EventKind::clock_tick(Plane::Control), EventKind::ControlClockTick);
        assert_eq!(EventKind::clock_tick(Plane::Application), EventKind::AppClockTick);
    }

    #[test]
    fn test_display() {
        let packet = Packet::data(NodeId::new(1), NodeId::new(2), vec![0; 4]);
        let ev = Event::delivery(18, packet, NodeId::new(2), Interface::Port(0));
        let s = ev.to_string();
        assert!(s.starts_with("DeliverPacket at 18"));
        assert!(s.contains("node 2 iface 0"));

        let admin = Event::administrative(EventKind::DumpRoutes, 5, vec!["all".into()]);
        assert_eq!(admin.arg(0), Some("all"));
        assert_eq!(admin.arg(1), None);
        assert!(admin.to_string().contains("args [all]"));
    }
}
