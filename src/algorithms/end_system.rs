// Control plane of a host with a single interface.

use super::ControlAlgorithm;
use crate::error::{SimError, SimResult};
use crate::network::{Interface, NodeId, Packet};
use crate::node::NodeContext;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct EndSystemControl {
    node: Option<NodeId>,
}

impl EndSystemControl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ControlAlgorithm for EndSystemControl {
    fn name(&self) -> &str {
        "end system"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<u64> {
        if ctx.interface_count() > 1 {
            return Err(SimError::Algorithm {
                node: ctx.node_id(),
                message: format!(
                    "end system has {} interfaces, only one is supported",
                    ctx.interface_count()
                ),
            });
        }
        self.node = Some(ctx.node_id());
        Ok(0)
    }

    fn forward_packet(
        &mut self,
        ctx: &mut NodeContext<'_>,
        packet: Packet,
        interface: Interface,
    ) -> SimResult<()> {
        match interface {
            Interface::Local => {
                debug!("end system {} at {}: sending local packet", ctx.node_id(), ctx.now());
                ctx.send(packet, Interface::Port(0))
            }
            Interface::Port(0) => {
                debug!(
                    "end system {} at {}: packet for another node, ignoring it",
                    ctx.node_id(),
                    ctx.now()
                );
                ctx.send(packet, Interface::Unknown)
            }
            other => {
                warn!(
                    "end system {} at {}: unexpected forward on interface {}",
                    ctx.node_id(),
                    ctx.now(),
                    other
                );
                ctx.send(packet, Interface::Unknown)
            }
        }
    }

    fn show_routing_table(&self, now: u64) {
        if let Some(node) = self.node {
            info!("end system {} at {}: no routing table, everything leaves on 0", node, now);
        }
    }

    fn show_control_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("end system {} at {}: no control state", node, now);
        }
    }
}
