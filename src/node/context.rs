use super::{NodeState, Plane};
use crate::error::{SimError, SimResult};
use crate::network::{
    Destination, Endpoint, Interface, Link, NodeId, Packet, PacketKind, RoutingMetric,
};
use crate::simulation::event::{Event, EventKind};
use crate::simulation::parameters::GlobalParameters;
use tracing::debug;

/// What an algorithm may see and do while one of its callbacks runs.
///
/// A context borrows the node's state, the simulator's link table and the
/// global parameters for the duration of a single callback. Everything it
/// produces (packets on links, timer and self-delivery events) takes effect
/// once the callback returns.
pub struct NodeContext<'a> {
    state: &'a mut NodeState,
    links: &'a mut [Link],
    parameters: &'a GlobalParameters,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        state: &'a mut NodeState,
        links: &'a mut [Link],
        parameters: &'a GlobalParameters,
    ) -> Self {
        Self {
            state,
            links,
            parameters,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.state.id
    }

    pub fn now(&self) -> u64 {
        self.state.now
    }

    pub fn parameters(&self) -> &GlobalParameters {
        self.parameters
    }

    pub fn interface_count(&self) -> usize {
        self.state.interface_count
    }

    /// Arguments given to the node on its `node` configuration line.
    pub fn args(&self) -> &[String] {
        &self.state.args
    }

    /// The link attached to `port`, if any.
    pub fn link(&self, port: usize) -> Option<&Link> {
        self.state
            .links
            .get(port)
            .copied()
            .flatten()
            .and_then(|index| self.links.get(index))
    }

    /// Send a packet out of `interface`.
    ///
    /// `Unknown` or a port the node does not have drops the packet. A packet
    /// addressed to this node, or sent on `Local`, comes back as a delivery
    /// on the local interface in the next millisecond. The sent counter is
    /// bumped in every case.
    pub fn send(&mut self, packet: Packet, interface: Interface) -> SimResult<()> {
        let id = self.state.id;
        self.state.stats.sent += 1;

        match interface {
            Interface::Unknown => self.drop_packet(packet, "no route"),
            Interface::Port(port) if port >= self.state.interface_count => {
                self.drop_packet(packet, "no such interface")
            }
            Interface::Local => self.deliver_locally(packet),
            Interface::Port(_) if packet.destination().is(id) => self.deliver_locally(packet),
            Interface::Port(port) => self.enqueue_on(port, packet)?,
        }
        Ok(())
    }

    fn drop_packet(&mut self, packet: Packet, reason: &str) {
        self.state.stats.dropped += 1;
        debug!(
            "node {} at {}: {}, dropping ({})",
            self.state.id, self.state.now, reason, packet
        );
    }

    fn deliver_locally(&mut self, packet: Packet) {
        let at = self.state.now + 1;
        let id = self.state.id;
        self.state
            .output
            .push_back(Event::delivery(at, packet, id, Interface::Local));
    }

    fn enqueue_on(&mut self, port: usize, packet: Packet) -> SimResult<()> {
        let id = self.state.id;
        let Some(index) = self.state.links.get(port).copied().flatten() else {
            self.drop_packet(packet, "interface not attached");
            return Ok(());
        };
        let interface = Interface::Port(port);
        let link = self
            .links
            .get_mut(index)
            .ok_or(SimError::InvalidInterface { node: id, interface })?;
        let side = link
            .side_of(Endpoint { node: id, interface: port })
            .ok_or(SimError::InvalidInterface { node: id, interface })?;
        link.enqueue(side, packet);
        Ok(())
    }

    /// Send a locally originated data packet.
    ///
    /// The packet is handed to the control algorithm's `forward_packet` on
    /// the `Local` interface once the current callback returns.
    pub fn send_data(&mut self, packet: Packet) -> SimResult<()> {
        let id = self.state.id;
        if packet.source() != id {
            return Err(SimError::ForeignDataPacket {
                node: id,
                origin: packet.source(),
            });
        }
        if packet.kind() != PacketKind::Data {
            return Err(SimError::NotDataPacket {
                node: id,
                kind: format!("{:?}", packet.kind()),
            });
        }

        if packet.destination().is(id) {
            self.state.stats.sent += 1;
            self.deliver_locally(packet);
        } else {
            self.state.stats.forwarded += 1;
            self.state.local_sends.push_back(packet);
        }
        Ok(())
    }

    /// Arm the application timeout `ms` from now, replacing any pending one.
    pub fn set_timeout(&mut self, ms: u64) -> SimResult<()> {
        self.arm_timeout(Plane::Application, ms)
    }

    /// Arm the control timeout `ms` from now, replacing any pending one.
    pub fn set_control_timeout(&mut self, ms: u64) -> SimResult<()> {
        self.arm_timeout(Plane::Control, ms)
    }

    fn arm_timeout(&mut self, plane: Plane, ms: u64) -> SimResult<()> {
        if ms < 1 {
            return Err(SimError::InvalidTimeout {
                node: self.state.id,
                plane,
                ms,
            });
        }
        let at = self.state.now + ms;
        self.state.timers_mut(plane).arm_timeout(at);
        self.state.schedule_timer(EventKind::timeout(plane), at);
        Ok(())
    }

    pub fn create_data_packet(
        &mut self,
        destination: impl Into<Destination>,
        payload: Vec<u8>,
    ) -> Packet {
        let mut packet = Packet::data(self.state.id, destination, payload);
        packet.set_sequence(self.state.next_sequence());
        packet
    }

    pub fn create_control_packet(
        &mut self,
        destination: impl Into<Destination>,
        payload: Vec<u8>,
    ) -> Packet {
        let mut packet = Packet::control(self.state.id, destination, payload);
        packet.set_sequence(self.state.next_sequence());
        packet
    }

    /// Cost of `interface` under `metric`; the local interface costs nothing.
    pub fn interface_weight(&self, interface: Interface, metric: RoutingMetric) -> SimResult<u64> {
        match interface {
            Interface::Local => Ok(0),
            Interface::Port(port) => self
                .link(port)
                .map(|link| metric.weight(link.bandwidth_bps()))
                .ok_or(SimError::InvalidInterface {
                    node: self.state.id,
                    interface,
                }),
            Interface::Unknown => Err(SimError::InvalidInterface {
                node: self.state.id,
                interface,
            }),
        }
    }

    pub fn interface_state(&self, interface: Interface) -> bool {
        match interface {
            Interface::Local => true,
            Interface::Port(port) => self.link(port).is_some_and(Link::is_up),
            Interface::Unknown => false,
        }
    }
}
