//! Builtin application algorithms.
//!
//! They log what happens to them at INFO and keep just enough state for
//! `dumpappstate` to report something useful.

use super::ApplicationAlgorithm;
use crate::error::{SimError, SimResult};
use crate::network::{NodeId, Packet};
use crate::node::NodeContext;
use tracing::info;

pub(super) const DEFAULT_PEER: u32 = 2;
pub(super) const BULK_PAYLOAD: usize = 1000;

pub(super) fn parse_peer(ctx: &NodeContext<'_>, arg: &str) -> SimResult<NodeId> {
    arg.parse::<u32>()
        .map(NodeId::new)
        .map_err(|_| SimError::Algorithm {
            node: ctx.node_id(),
            message: format!("`{}` is not a node id", arg),
        })
}

/// Does nothing but log.
#[derive(Debug, Default)]
pub struct EmptyApp {
    node: Option<NodeId>,
}

impl EmptyApp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for EmptyApp {
    fn name(&self) -> &str {
        "empty app"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, _args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        info!("empty app {} at {}: starting", ctx.node_id(), ctx.now());
        Ok(0)
    }

    fn on_clock_tick(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<()> {
        info!("empty app {} at {}: clock tick", ctx.node_id(), ctx.now());
        Ok(())
    }

    fn on_timeout(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<()> {
        info!("empty app {} at {}: timeout", ctx.node_id(), ctx.now());
        Ok(())
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        info!("empty app {} at {}: received packet ({})", ctx.node_id(), ctx.now(), packet);
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("empty app {} at {}: no state to show", node, now);
        }
    }
}

/// Sends one greeting to every node named in its arguments at start-up.
#[derive(Debug, Default)]
pub struct SimpleSender {
    node: Option<NodeId>,
    sent: u64,
    echoes: u64,
}

impl SimpleSender {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for SimpleSender {
    fn name(&self) -> &str {
        "simple sender"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        let peers = if args.is_empty() {
            vec![NodeId::new(DEFAULT_PEER)]
        } else {
            args.iter()
                .map(|arg| parse_peer(ctx, arg))
                .collect::<SimResult<Vec<_>>>()?
        };

        for peer in peers {
            let message = format!("hello I am the simple sender on node {}", ctx.node_id());
            let packet = ctx.create_data_packet(peer, message.into_bytes());
            info!("simple sender {} at {}: sent packet ({})", ctx.node_id(), ctx.now(), packet);
            ctx.send_data(packet)?;
            self.sent += 1;
        }
        Ok(0)
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        self.echoes += 1;
        info!(
            "simple sender {} at {}: received echoed message \"{}\"",
            ctx.node_id(),
            ctx.now(),
            packet.payload_text()
        );
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!(
                "simple sender {} at {}: sent {} echoes {}",
                node, now, self.sent, self.echoes
            );
        }
    }
}

/// Echoes every data packet back to its source.
#[derive(Debug, Default)]
pub struct SimpleReceiver {
    node: Option<NodeId>,
    received: u64,
}

impl SimpleReceiver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for SimpleReceiver {
    fn name(&self) -> &str {
        "simple receiver"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, _args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        Ok(0)
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        self.received += 1;
        let reply = format!(
            "simple receiver received message \"{}\"",
            packet.payload_text()
        );
        info!("simple receiver {} at {}: {}", ctx.node_id(), ctx.now(), reply);
        let echo = ctx.create_data_packet(packet.source(), reply.into_bytes());
        ctx.send_data(echo)
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("simple receiver {} at {}: received {}", node, now, self.received);
        }
    }
}

/// Sends a 1000-byte packet every millisecond until `args[0]` to node
/// `args[1]` (node 2 when absent).
#[derive(Debug, Default)]
pub struct SimpleBulkSender {
    node: Option<NodeId>,
    until: u64,
    peer: Option<NodeId>,
    sent: u64,
}

impl SimpleBulkSender {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for SimpleBulkSender {
    fn name(&self) -> &str {
        "simple bulk sender"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, args: &[String]) -> SimResult<u64> {
        let node = ctx.node_id();
        self.node = Some(node);
        let until = args.first().ok_or_else(|| SimError::Algorithm {
            node,
            message: "bulk sender needs the time of its last send as first argument".into(),
        })?;
        self.until = until.parse().map_err(|_| SimError::Algorithm {
            node,
            message: format!("`{}` is not a time in ms", until),
        })?;
        self.peer = Some(match args.get(1) {
            Some(arg) => parse_peer(ctx, arg)?,
            None => NodeId::new(DEFAULT_PEER),
        });
        info!("bulk sender {} at {}: starting", node, ctx.now());
        Ok(1)
    }

    fn on_clock_tick(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<()> {
        let (Some(peer), true) = (self.peer, ctx.now() <= self.until) else {
            return Ok(());
        };
        let packet = ctx.create_data_packet(peer, vec![0; BULK_PAYLOAD]);
        ctx.send_data(packet)?;
        self.sent += 1;
        Ok(())
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        info!(
            "bulk sender {} at {}: received \"{}\"",
            ctx.node_id(),
            ctx.now(),
            packet.payload_text()
        );
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("bulk sender {} at {}: sent {}", node, now, self.sent);
        }
    }
}
