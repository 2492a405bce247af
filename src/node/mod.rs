//! One network element: its link table, timers, counters and the two
//! algorithm instances it exclusively owns.
//!
//! The simulator hands every due node-addressed event to [`Node::deliver`]
//! and then calls [`Node::process`] once per tick. Processing drains the
//! input queue in order and turns each event into algorithm callbacks. What
//! the callbacks produce lands in the output queue, which the simulator
//! collects with [`Node::drain_output`].

pub mod context;
pub mod timers;

pub use context::NodeContext;
pub use timers::{Plane, PlaneTimers};

use crate::algorithms::{ApplicationAlgorithm, ControlAlgorithm};
use crate::error::{SimError, SimResult};
use crate::network::{Destination, Interface, Link, NodeId, Packet, PacketKind};
use crate::simulation::event::{Event, EventKind};
use crate::simulation::parameters::GlobalParameters;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacketStats {
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub forwarded: u64,
}

/// The part of a node that algorithm callbacks may touch through a
/// [`NodeContext`].
#[derive(Debug)]
pub struct NodeState {
    id: NodeId,
    interface_count: usize,
    // link table index per interface
    links: Vec<Option<usize>>,
    args: Vec<String>,
    now: u64,
    packet_counter: u64,
    stats: PacketStats,
    control_timers: PlaneTimers,
    app_timers: PlaneTimers,
    output: VecDeque<Event>,
    local_sends: VecDeque<Packet>,
    completed_traces: Vec<String>,
}

impl NodeState {
    fn new(id: NodeId, interface_count: usize, args: Vec<String>) -> Self {
        Self {
            id,
            interface_count,
            links: vec![None; interface_count],
            args,
            now: 0,
            packet_counter: 0,
            stats: PacketStats::default(),
            control_timers: PlaneTimers::default(),
            app_timers: PlaneTimers::default(),
            output: VecDeque::new(),
            local_sends: VecDeque::new(),
            completed_traces: Vec::new(),
        }
    }

    pub(crate) fn timers_mut(&mut self, plane: Plane) -> &mut PlaneTimers {
        match plane {
            Plane::Control => &mut self.control_timers,
            Plane::Application => &mut self.app_timers,
        }
    }

    fn timers(&self, plane: Plane) -> &PlaneTimers {
        match plane {
            Plane::Control => &self.control_timers,
            Plane::Application => &self.app_timers,
        }
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.packet_counter += 1;
        self.packet_counter
    }

    pub(crate) fn schedule_timer(&mut self, kind: EventKind, at: u64) {
        self.output.push_back(Event {
            node: Some(self.id),
            ..Event::new(kind, at)
        });
    }

    fn arm_clock_tick(&mut self, plane: Plane) {
        let now = self.now;
        if let Some(at) = self.timers_mut(plane).arm_clock_tick(now) {
            self.schedule_timer(EventKind::clock_tick(plane), at);
        }
    }
}

pub struct Node {
    state: NodeState,
    control: Box<dyn ControlAlgorithm>,
    application: Box<dyn ApplicationAlgorithm>,
    control_name: String,
    application_name: String,
    input: VecDeque<Event>,
}

impl Node {
    pub fn new(
        id: NodeId,
        interface_count: usize,
        control: Box<dyn ControlAlgorithm>,
        application: Box<dyn ApplicationAlgorithm>,
        args: Vec<String>,
    ) -> Self {
        Self {
            state: NodeState::new(id, interface_count, args),
            control_name: control.name().to_string(),
            application_name: application.name().to_string(),
            control,
            application,
            input: VecDeque::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.state.id
    }

    pub fn interface_count(&self) -> usize {
        self.state.interface_count
    }

    pub fn stats(&self) -> PacketStats {
        self.state.stats
    }

    pub fn now(&self) -> u64 {
        self.state.now
    }

    /// Paths of the tracing packets that ended at this node, oldest first.
    pub fn completed_traces(&self) -> &[String] {
        &self.state.completed_traces
    }

    pub fn expected_timeout(&self, plane: Plane) -> Option<u64> {
        self.state.timers(plane).expected_timeout()
    }

    pub fn clock_period(&self, plane: Plane) -> Option<u64> {
        self.state.timers(plane).clock_period()
    }

    /// Indices into the simulator's link table of the attached links.
    pub fn attached_links(&self) -> impl Iterator<Item = usize> + '_ {
        self.state.links.iter().flatten().copied()
    }

    pub fn attach_link(&mut self, interface: usize, link_index: usize) -> SimResult<()> {
        let count = self.state.interface_count;
        let slot = self
            .state
            .links
            .get_mut(interface)
            .ok_or(SimError::BadEndpoint {
                node: self.state.id,
                interface,
                count,
            })?;
        if slot.is_some() {
            return Err(SimError::InterfaceInUse {
                node: self.state.id,
                interface,
            });
        }
        *slot = Some(link_index);
        Ok(())
    }

    /// Bootstrap both algorithms at time 0 and arm any requested clock ticks.
    pub fn initialise(
        &mut self,
        links: &mut [Link],
        parameters: &GlobalParameters,
    ) -> SimResult<()> {
        self.state.now = 0;

        let mut ctx = NodeContext::new(&mut self.state, links, parameters);
        let control_period = self.control.initialise(&mut ctx)?;
        let args = ctx.args().to_vec();
        let app_period = self.application.initialise(&mut ctx, &args)?;

        self.state.control_timers.set_clock_period(control_period);
        self.state.app_timers.set_clock_period(app_period);
        self.state.arm_clock_tick(Plane::Control);
        self.state.arm_clock_tick(Plane::Application);
        info!(
            "node {} up: control {} (tick {:?}) application {} (tick {:?})",
            self.state.id,
            self.control_name,
            self.state.control_timers.clock_period(),
            self.application_name,
            self.state.app_timers.clock_period()
        );

        self.flush_local_sends(links, parameters)
    }

    /// Queue an event for the next call to [`Node::process`].
    pub fn deliver(&mut self, event: Event) {
        self.input.push_back(event);
    }

    pub fn has_input(&self) -> bool {
        !self.input.is_empty()
    }

    pub fn drain_output(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.state.output.drain(..)
    }

    /// Handle every queued input event for tick `now`.
    pub fn process(
        &mut self,
        now: u64,
        links: &mut [Link],
        parameters: &GlobalParameters,
    ) -> SimResult<()> {
        self.state.now = now;
        let mut events: Vec<Event> = self.input.drain(..).collect();

        // A delivery for a plane pre-empts that plane's timeout in the same tick.
        for plane in [Plane::Control, Plane::Application] {
            if events.iter().any(|e| self.is_local_delivery_for(e, plane)) {
                let kind = EventKind::timeout(plane);
                events.retain(|e| e.kind != kind);
            }
        }

        for event in events {
            if event.time != now {
                return Err(SimError::EventOutOfOrder {
                    node: self.state.id,
                    now,
                    event: event.to_string(),
                });
            }
            self.dispatch(event, links, parameters)?;
            self.flush_local_sends(links, parameters)?;
        }
        Ok(())
    }

    fn is_local_delivery_for(&self, event: &Event, plane: Plane) -> bool {
        let Some(packet) = event.packet.as_ref() else {
            return false;
        };
        let kind_matches = match plane {
            Plane::Control => packet.kind() == PacketKind::Control,
            Plane::Application => packet.kind() == PacketKind::Data,
        };
        event.kind == EventKind::DeliverPacket
            && kind_matches
            && !packet.is_expired()
            && self.is_addressed_here(packet)
    }

    fn is_addressed_here(&self, packet: &Packet) -> bool {
        match packet.destination() {
            Destination::Node(id) => id == self.state.id,
            Destination::FirstHop => true,
        }
    }

    fn dispatch(
        &mut self,
        event: Event,
        links: &mut [Link],
        parameters: &GlobalParameters,
    ) -> SimResult<()> {
        let now = self.state.now;
        let id = self.state.id;

        match event.kind {
            EventKind::LinkUp | EventKind::LinkDown => {
                let port = event
                    .interface
                    .and_then(Interface::port)
                    .ok_or_else(|| SimError::MalformedEvent {
                        event: event.to_string(),
                        reason: "link event without a port".into(),
                    })?;
                let mut ctx = NodeContext::new(&mut self.state, links, parameters);
                if event.kind == EventKind::LinkUp {
                    info!("node {} at {} interface {} going up", id, now, port);
                    self.control.on_link_up(&mut ctx, port)
                } else {
                    info!("node {} at {} interface {} going down", id, now, port);
                    self.control.on_link_down(&mut ctx, port)
                }
            }
            EventKind::ControlClockTick | EventKind::AppClockTick => {
                let plane = if event.kind == EventKind::ControlClockTick {
                    Plane::Control
                } else {
                    Plane::Application
                };
                if !self.state.timers_mut(plane).take_clock_tick(now) {
                    debug!("node {} at {}: stale {} clock tick", id, now, plane);
                    return Ok(());
                }
                let mut ctx = NodeContext::new(&mut self.state, links, parameters);
                match plane {
                    Plane::Control => self.control.on_clock_tick(&mut ctx)?,
                    Plane::Application => self.application.on_clock_tick(&mut ctx)?,
                }
                self.state.arm_clock_tick(plane);
                Ok(())
            }
            EventKind::ControlTimeout | EventKind::AppTimeout => {
                let plane = if event.kind == EventKind::ControlTimeout {
                    Plane::Control
                } else {
                    Plane::Application
                };
                if !self.state.timers_mut(plane).take_timeout(now) {
                    debug!("node {} at {}: stale {} timeout", id, now, plane);
                    return Ok(());
                }
                let mut ctx = NodeContext::new(&mut self.state, links, parameters);
                match plane {
                    Plane::Control => self.control.on_timeout(&mut ctx),
                    Plane::Application => self.application.on_timeout(&mut ctx),
                }
            }
            EventKind::DeliverPacket => {
                let interface = event.interface.unwrap_or(Interface::Local);
                match event.packet {
                    Some(packet) => self.on_packet(packet, interface, links, parameters),
                    None => Err(SimError::MalformedEvent {
                        event: format!("{:?} at {}", event.kind, event.time),
                        reason: "delivery without a packet".into(),
                    }),
                }
            }
            _ => Err(SimError::MalformedEvent {
                event: event.to_string(),
                reason: "not a node event".into(),
            }),
        }
    }

    fn on_packet(
        &mut self,
        mut packet: Packet,
        interface: Interface,
        links: &mut [Link],
        parameters: &GlobalParameters,
    ) -> SimResult<()> {
        let now = self.state.now;
        let id = self.state.id;

        if packet.is_expired() {
            self.state.stats.dropped += 1;
            debug!("node {} at {}: dropping expired packet ({})", id, now, packet);
            return Ok(());
        }

        if self.is_addressed_here(&packet) {
            self.state.stats.received += 1;
            match packet.kind() {
                PacketKind::Data => {
                    self.state.app_timers.cancel_timeout();
                    let mut ctx = NodeContext::new(&mut self.state, links, parameters);
                    self.application.on_receive(&mut ctx, packet)
                }
                PacketKind::Control => {
                    self.state.control_timers.cancel_timeout();
                    let mut ctx = NodeContext::new(&mut self.state, links, parameters);
                    self.control.on_receive(&mut ctx, packet, interface)
                }
                PacketKind::Tracing => {
                    let path = format!("{} -> {}", packet.payload_text(), id);
                    info!("node {} at {} received tracing packet with path{}", id, now, path);
                    self.state.completed_traces.push(path);
                    Ok(())
                }
            }
        } else {
            packet.decrement_ttl();
            let mut interface = interface;
            if packet.kind() == PacketKind::Tracing {
                if packet.source() == id {
                    // the traceroute starts here
                    self.state.stats.sent += 1;
                    interface = Interface::Local;
                    let sequence = self.state.next_sequence();
                    packet.set_sequence(sequence);
                    packet.set_payload(format!(" -> source: {}", id).into_bytes());
                } else {
                    packet.append_payload(format!(" -> {}", id).as_bytes());
                }
            }
            self.state.stats.forwarded += 1;
            let mut ctx = NodeContext::new(&mut self.state, links, parameters);
            self.control.forward_packet(&mut ctx, packet, interface)
        }
    }

    fn flush_local_sends(
        &mut self,
        links: &mut [Link],
        parameters: &GlobalParameters,
    ) -> SimResult<()> {
        while let Some(packet) = self.state.local_sends.pop_front() {
            let mut ctx = NodeContext::new(&mut self.state, links, parameters);
            self.control.forward_packet(&mut ctx, packet, Interface::Local)?;
        }
        Ok(())
    }

    pub fn dump_routes(&self, now: u64) {
        self.control.show_routing_table(now);
    }

    pub fn dump_control_state(&self, now: u64) {
        self.control.show_control_state(now);
    }

    pub fn dump_app_state(&self, now: u64) {
        self.application.show_state(now);
    }

    pub fn dump_packet_stats(&self, now: u64, links: &[Link]) {
        let s = self.state.stats;
        info!(
            "Pkt stats for node {} time {} - s {} r {} d {} f {}",
            self.state.id, now, s.sent, s.received, s.dropped, s.forwarded
        );
        for link in self.attached_links().filter_map(|i| links.get(i)) {
            info!("{}", link.stats_line());
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node {}: {} interfaces, control {} app {}",
            self.state.id, self.state.interface_count, self.control_name, self.application_name
        )
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("state", &self.state)
            .field("control", &self.control_name)
            .field("application", &self.application_name)
            .field("input", &self.input.len())
            .finish()
    }
}
