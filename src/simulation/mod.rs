pub mod config;
pub mod event;
pub mod parameters;
pub mod scheduler;

pub use config::{LinkSpec, NodeSpec, ScenarioConfig, ScheduledAction};
pub use event::{Event, EventKind};
pub use parameters::GlobalParameters;
pub use scheduler::EventQueue;

use crate::algorithms::AlgorithmRegistry;
use crate::error::{SimError, SimResult};
use crate::metrics::TraceEntry;
use crate::network::{Endpoint, Interface, Link, NodeId, Packet, Side};
use crate::node::Node;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// Nothing was left to do.
    Drained,
    /// Work remained past the stop time and was cut off.
    StopTimeReached,
}

/// Owns the global event queue, every node and every link, and drives them
/// through the fixed per-tick phase order: due events, then nodes, then links.
pub struct Simulator {
    queue: EventQueue,
    nodes: BTreeMap<NodeId, Node>,
    links: Vec<Link>,
    parameters: GlobalParameters,
    now: u64,
    steps: u64,
    tracing_sequence: u64,
    bootstrapped: bool,
    trace: Option<Vec<TraceEntry>>,
}

impl Simulator {
    /// An empty simulator; the stop time and link seed come from `parameters`.
    pub fn new(parameters: GlobalParameters) -> Self {
        Self {
            queue: EventQueue::new(parameters.stop_time()),
            nodes: BTreeMap::new(),
            links: Vec::new(),
            parameters,
            now: 0,
            steps: 0,
            tracing_sequence: 0,
            bootstrapped: false,
            trace: None,
        }
    }

    /// Build nodes, links and scheduled actions from a parsed scenario,
    /// resolving algorithm names through `registry`.
    pub fn from_config(config: &ScenarioConfig, registry: &AlgorithmRegistry) -> SimResult<Self> {
        let mut sim = Self::new(config.parameters.clone());

        for spec in &config.nodes {
            let control = registry.create_control(&spec.control)?;
            let application = registry.create_application(&spec.application)?;
            sim.add_node(Node::new(
                spec.id,
                spec.interfaces,
                control,
                application,
                spec.args.clone(),
            ))?;
        }

        let seed = sim.parameters.seed();
        for spec in &config.links {
            let link = Link::new(
                spec.a,
                spec.b,
                spec.bandwidth_bps,
                spec.latency_ms,
                spec.error_rate,
                spec.jitter,
                seed,
            );
            sim.connect(link, spec.up)?;
        }

        for action in &config.actions {
            sim.schedule(Event::administrative(action.kind, action.time, action.args.clone()));
        }

        info!(
            "loaded {} nodes, {} links, {} actions, stop at {}",
            sim.nodes.len(),
            sim.links.len(),
            config.actions.len(),
            sim.stop_time()
        );
        Ok(sim)
    }

    pub fn add_node(&mut self, node: Node) -> SimResult<()> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(SimError::DuplicateNode(id));
        }
        debug!("created {}", node);
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Attach `link` to both of its endpoint nodes. Returns its index.
    pub fn connect(&mut self, mut link: Link, up: bool) -> SimResult<usize> {
        let index = self.links.len();
        for endpoint in [link.endpoint(Side::A), link.endpoint(Side::B)] {
            self.nodes
                .get_mut(&endpoint.node)
                .ok_or(SimError::UnknownNode(endpoint.node))?
                .attach_link(endpoint.interface, index)?;
        }
        link.set_state(up);
        debug!("added link {}", link);
        self.links.push(link);
        Ok(index)
    }

    /// Queue an event from outside the run. Returns `None` if it falls
    /// beyond the stop time and was discarded.
    pub fn schedule(&mut self, event: Event) -> Option<u64> {
        self.queue.push(event)
    }

    /// Keep a record of every event taken off the global queue.
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.as_deref().unwrap_or_default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn stop_time(&self) -> u64 {
        self.queue.horizon()
    }

    pub fn parameters(&self) -> &GlobalParameters {
        &self.parameters
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn discarded_events(&self) -> u64 {
        self.queue.discarded()
    }

    /// Initialise every node at time 0 and flush what they queued on links.
    /// Only the first call does anything.
    pub fn bootstrap(&mut self) -> SimResult<()> {
        if self.bootstrapped {
            return Ok(());
        }
        self.bootstrapped = true;
        self.now = 0;
        info!("simulation starts - processing step of time = 0");

        for node in self.nodes.values_mut() {
            node.initialise(&mut self.links, &self.parameters)?;
            for event in node.drain_output() {
                enqueue_generated(&mut self.queue, 0, event)?;
            }
        }
        self.transmit_links(0)
    }

    /// Run one processing step at the time of the earliest queued event.
    /// Returns that time, or `None` when there is nothing left to do before
    /// the stop time.
    pub fn step(&mut self) -> SimResult<Option<u64>> {
        self.bootstrap()?;
        let Some(now) = self.queue.next_time() else {
            return Ok(None);
        };
        if now > self.stop_time() {
            return Ok(None);
        }
        self.now = now;
        self.steps += 1;

        while let Some(event) = self.queue.pop_due(now) {
            if let Some(trace) = self.trace.as_mut() {
                trace.push(TraceEntry::from_event(&event));
            }
            self.dispatch(event)?;
        }

        for node in self.nodes.values_mut() {
            if node.has_input() {
                node.process(now, &mut self.links, &self.parameters)?;
            }
            for event in node.drain_output() {
                enqueue_generated(&mut self.queue, now, event)?;
            }
        }

        self.transmit_links(now)?;
        Ok(Some(now))
    }

    pub fn run(&mut self) -> SimResult<Termination> {
        self.run_with_progress(|_| {})
    }

    /// Like [`Simulator::run`], calling `on_step` with the virtual time after
    /// every processing step.
    pub fn run_with_progress<F: FnMut(u64)>(&mut self, mut on_step: F) -> SimResult<Termination> {
        while let Some(now) = self.step()? {
            on_step(now);
        }

        let termination = match self.queue.next_time() {
            None if self.queue.discarded() > 0 => Termination::StopTimeReached,
            None => Termination::Drained,
            Some(time) if time > self.stop_time() => Termination::StopTimeReached,
            Some(_) => return Err(SimError::QueueNotDrained(self.queue.len())),
        };
        info!(
            "simulation ended at {} after {} steps ({:?})",
            self.now, self.steps, termination
        );
        Ok(termination)
    }

    fn transmit_links(&mut self, now: u64) -> SimResult<()> {
        for link in &mut self.links {
            link.transmit(now)?;
            for event in link.drain_deliveries() {
                enqueue_generated(&mut self.queue, now, event)?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> SimResult<()> {
        if !event.kind.is_administrative() {
            let Some(id) = event.node else {
                return Err(malformed(&event, "node event without a node"));
            };
            return match self.nodes.get_mut(&id) {
                Some(node) => {
                    node.deliver(event);
                    Ok(())
                }
                None => Err(SimError::UnroutableEvent(event.to_string())),
            };
        }

        match event.kind {
            EventKind::Traceroute => self.start_traceroute(&event),
            EventKind::LinkUp | EventKind::LinkDown => self.toggle_link(&event),
            _ => self.dump(&event),
        }
    }

    fn start_traceroute(&mut self, event: &Event) -> SimResult<()> {
        let source = NodeId::new(parse_arg(event, 0)?);
        let destination = NodeId::new(parse_arg(event, 1)?);
        let node = self
            .nodes
            .get_mut(&source)
            .ok_or(SimError::UnknownNode(source))?;

        self.tracing_sequence += 1;
        let mut packet = Packet::tracing(source, destination);
        packet.set_sequence(self.tracing_sequence);
        info!("traceroute from {} to {} at {}", source, destination, self.now);
        node.deliver(Event::delivery(self.now, packet, source, Interface::Local));
        Ok(())
    }

    fn toggle_link(&mut self, event: &Event) -> SimResult<()> {
        let a = Endpoint::new(parse_arg(event, 0)?, parse_arg(event, 1)?);
        let b = Endpoint::new(parse_arg(event, 2)?, parse_arg(event, 3)?);
        let link = self
            .links
            .iter_mut()
            .find(|link| link.joins(a, b))
            .ok_or(SimError::NoSuchLink {
                a_node: a.node,
                a_interface: a.interface,
                b_node: b.node,
                b_interface: b.interface,
            })?;

        let up = event.kind == EventKind::LinkUp;
        link.set_state(up);
        info!(
            "setting link status to {} {}",
            if up { "up" } else { "down" },
            link
        );

        for endpoint in [a, b] {
            let node = self
                .nodes
                .get_mut(&endpoint.node)
                .ok_or(SimError::UnknownNode(endpoint.node))?;
            let interface = Interface::Port(endpoint.interface);
            node.deliver(Event::new(event.kind, self.now).for_node(endpoint.node, interface));
        }
        Ok(())
    }

    fn dump(&self, event: &Event) -> SimResult<()> {
        let target = event
            .arg(0)
            .ok_or_else(|| malformed(event, "missing dump target"))?;
        let selected: Vec<&Node> = if target.eq_ignore_ascii_case("all") {
            self.nodes.values().collect()
        } else {
            let id = NodeId::new(parse_arg(event, 0)?);
            vec![self.nodes.get(&id).ok_or(SimError::UnknownNode(id))?]
        };

        for node in selected {
            match event.kind {
                EventKind::DumpRoutes => node.dump_routes(self.now),
                EventKind::DumpControlState => node.dump_control_state(self.now),
                EventKind::DumpAppState => node.dump_app_state(self.now),
                _ => node.dump_packet_stats(self.now, &self.links),
            }
        }
        Ok(())
    }
}

/// Queue an event produced during tick `now`; it must lie strictly ahead.
fn enqueue_generated(queue: &mut EventQueue, now: u64, event: Event) -> SimResult<()> {
    if event.time <= now {
        return Err(SimError::EventInPast {
            now,
            event: event.to_string(),
        });
    }
    let time = event.time;
    if queue.push(event).is_none() {
        debug!("event at {} is past the stop time, discarded", time);
    }
    Ok(())
}

fn parse_arg<T: FromStr>(event: &Event, index: usize) -> SimResult<T> {
    let raw = event
        .arg(index)
        .ok_or_else(|| malformed(event, &format!("missing argument {}", index)))?;
    raw.parse()
        .map_err(|_| malformed(event, &format!("bad argument `{}`", raw)))
}

fn malformed(event: &Event, reason: &str) -> SimError {
    SimError::MalformedEvent {
        event: event.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_hosts(extra: &str) -> Simulator {
        let text = format!(
            "parameter stop 1000\n\
             node 1 1 end-system empty\n\
             node 2 1 end-system empty\n\
             link 1.0 2.0 1000000 10 0 0\n{}",
            extra
        );
        let config = ScenarioConfig::parse(&text).unwrap();
        Simulator::from_config(&config, &AlgorithmRegistry::new()).unwrap()
    }

    #[test]
    fn test_empty_run_drains() {
        let mut sim = two_hosts("");
        assert_eq!(sim.run().unwrap(), Termination::Drained);
        assert_eq!(sim.pending_events(), 0);
        assert_eq!(sim.now(), 0);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let config =
            ScenarioConfig::parse("node 1 1 end-system empty\nnode 1 1 end-system empty\n")
                .unwrap();
        assert_eq!(
            Simulator::from_config(&config, &AlgorithmRegistry::new()).err(),
            Some(SimError::DuplicateNode(NodeId::new(1)))
        );
    }

    #[test]
    fn test_bad_link_references() {
        let registry = AlgorithmRegistry::new();
        let unknown =
            ScenarioConfig::parse("node 1 1 end-system empty\nlink 1.0 9.0 10 1 0 0\n").unwrap();
        assert_eq!(
            Simulator::from_config(&unknown, &registry).err(),
            Some(SimError::UnknownNode(NodeId::new(9)))
        );

        let out_of_range = ScenarioConfig::parse(
            "node 1 1 end-system empty\nnode 2 1 end-system empty\nlink 1.3 2.0 10 1 0 0\n",
        )
        .unwrap();
        assert!(matches!(
            Simulator::from_config(&out_of_range, &registry),
            Err(SimError::BadEndpoint { interface: 3, count: 1, .. })
        ));

        let reused = ScenarioConfig::parse(
            "node 1 1 end-system empty\nnode 2 2 flooding-switch empty\n\
             link 1.0 2.0 10 1 0 0\nlink 1.0 2.1 10 1 0 0\n",
        )
        .unwrap();
        assert!(matches!(
            Simulator::from_config(&reused, &registry),
            Err(SimError::InterfaceInUse { interface: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_algorithm() {
        let config = ScenarioConfig::parse("node 1 1 rip empty\n").unwrap();
        assert_eq!(
            Simulator::from_config(&config, &AlgorithmRegistry::new()).err(),
            Some(SimError::UnknownControlAlgorithm("rip".into()))
        );
    }

    #[test]
    fn test_toggle_either_order_and_unknown_link() {
        let mut sim = two_hosts("downlink 5 2.0 1.0\nuplink 7 1.0 2.0\n");
        sim.run().unwrap();
        assert!(sim.links()[0].is_up());

        let mut sim = two_hosts("downlink 5 1.0 2.1\n");
        assert!(matches!(sim.run(), Err(SimError::NoSuchLink { .. })));
    }

    #[test]
    fn test_stepping() {
        let mut sim = two_hosts("dumppacketstats 5 all\ndumproutes 9 2\n");
        assert_eq!(sim.step().unwrap(), Some(5));
        assert_eq!(sim.step().unwrap(), Some(9));
        assert_eq!(sim.step().unwrap(), None);
        assert_eq!(sim.steps(), 2);
    }

    #[test]
    fn test_dump_unknown_node() {
        let mut sim = two_hosts("dumpappstate 5 7\n");
        assert_eq!(sim.run().err(), Some(SimError::UnknownNode(NodeId::new(7))));
    }

    #[test]
    fn test_node_event_in_the_past_is_fatal() {
        assert!(matches!(
            enqueue_generated(&mut EventQueue::new(100), 10, Event::new(EventKind::AppTimeout, 10)),
            Err(SimError::EventInPast { now: 10, .. })
        ));
    }

    #[test]
    fn test_trace_records_dispatched_events() {
        let mut sim = two_hosts("traceroute 3 1 2\n");
        sim.enable_trace();
        sim.run().unwrap();

        let kinds: Vec<_> = sim.trace().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Traceroute", "DeliverPacket"]);
        assert_eq!(sim.node(NodeId::new(2)).unwrap().completed_traces(), [" -> source: 1 -> 2"]);
    }
}
