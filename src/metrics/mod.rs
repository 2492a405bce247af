pub mod logger;

use crate::network::{LinkStats, Side};
use crate::node::PacketStats;
use crate::simulation::event::Event;
use crate::simulation::{Simulator, Termination};
use serde::Serialize;

/// One event as it was taken off the global queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub time: u64,
    pub sequence: u64,
    pub kind: String,
    pub node: Option<u32>,
    pub interface: Option<String>,
    pub args: String,
    pub packet: Option<String>,
}

impl TraceEntry {
    pub fn from_event(event: &Event) -> Self {
        Self {
            time: event.time,
            sequence: event.sequence,
            kind: format!("{:?}", event.kind),
            node: event.node.map(|n| n.raw()),
            interface: event.interface.map(|i| i.to_string()),
            args: event.args.join(" "),
            packet: event.packet.as_ref().map(|p| p.to_string()),
        }
    }
}

/// Per-node counters, flattened for CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub node: u32,
    pub interfaces: usize,
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub forwarded: u64,
    pub traces_completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub a: String,
    pub b: String,
    pub up: bool,
    #[serde(flatten)]
    pub stats: LinkStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub termination: Termination,
    pub final_time: u64,
    pub stop_time: u64,
    pub steps: u64,
    pub discarded_events: u64,
    pub totals: PacketStats,
    pub lost_on_links: u64,
    pub nodes: Vec<NodeSummary>,
    pub links: Vec<LinkSummary>,
}

impl RunSummary {
    pub fn collect(sim: &Simulator, termination: Termination) -> Self {
        let nodes: Vec<NodeSummary> = sim
            .nodes()
            .map(|node| {
                let stats = node.stats();
                NodeSummary {
                    node: node.id().raw(),
                    interfaces: node.interface_count(),
                    sent: stats.sent,
                    received: stats.received,
                    dropped: stats.dropped,
                    forwarded: stats.forwarded,
                    traces_completed: node.completed_traces().len(),
                }
            })
            .collect();

        let links: Vec<LinkSummary> = sim
            .links()
            .iter()
            .map(|link| LinkSummary {
                a: link.endpoint(Side::A).to_string(),
                b: link.endpoint(Side::B).to_string(),
                up: link.is_up(),
                stats: link.stats(),
            })
            .collect();

        let totals = nodes.iter().fold(PacketStats::default(), |mut acc, n| {
            acc.sent += n.sent;
            acc.received += n.received;
            acc.dropped += n.dropped;
            acc.forwarded += n.forwarded;
            acc
        });

        Self {
            termination,
            final_time: sim.now(),
            stop_time: sim.stop_time(),
            steps: sim.steps(),
            discarded_events: sim.discarded_events(),
            totals,
            lost_on_links: links.iter().map(|l| l.stats.lost).sum(),
            nodes,
            links,
        }
    }
}
