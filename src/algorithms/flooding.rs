use super::ControlAlgorithm;
use crate::error::SimResult;
use crate::network::{Interface, NodeId, Packet};
use crate::node::NodeContext;
use tracing::{debug, info};

/// Naive switch: every packet goes out of every attached port except the one
/// it came in on.
#[derive(Debug, Default)]
pub struct FloodingSwControl {
    node: Option<NodeId>,
    flooded: u64,
}

impl FloodingSwControl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ControlAlgorithm for FloodingSwControl {
    fn name(&self) -> &str {
        "flooding switch"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        Ok(0)
    }

    fn forward_packet(
        &mut self,
        ctx: &mut NodeContext<'_>,
        packet: Packet,
        interface: Interface,
    ) -> SimResult<()> {
        let ports: Vec<usize> = (0..ctx.interface_count())
            .filter(|&port| Interface::Port(port) != interface && ctx.link(port).is_some())
            .collect();

        let Some((&last, rest)) = ports.split_last() else {
            return ctx.send(packet, Interface::Unknown);
        };
        for &port in rest {
            ctx.send(packet.clone(), Interface::Port(port))?;
        }
        ctx.send(packet, Interface::Port(last))?;

        self.flooded += 1;
        debug!(
            "flooding switch {} at {}: forwarded {} copies",
            ctx.node_id(),
            ctx.now(),
            ports.len()
        );
        Ok(())
    }

    fn show_control_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("flooding switch {} at {}: flooded {} packets", node, now, self.flooded);
        }
    }
}
