//! Naive acknowledged transfers: stop-and-wait, and a window that doubles
//! every time it is filled and then acknowledged. Receivers answer each
//! data packet with a short `ACK <n>` packet.

use super::ApplicationAlgorithm;
use super::apps::{BULK_PAYLOAD, DEFAULT_PEER, parse_peer};
use crate::error::{SimError, SimResult};
use crate::network::{NodeId, Packet};
use crate::node::NodeContext;
use tracing::info;

fn parse_total(ctx: &NodeContext<'_>, args: &[String]) -> SimResult<u64> {
    let node = ctx.node_id();
    let total = args.first().ok_or_else(|| SimError::Algorithm {
        node,
        message: "the number of packets to transfer is required as first argument".into(),
    })?;
    total.parse().map_err(|_| SimError::Algorithm {
        node,
        message: format!("`{}` is not a packet count", total),
    })
}

fn parse_target(ctx: &NodeContext<'_>, args: &[String]) -> SimResult<NodeId> {
    match args.get(1) {
        Some(arg) => parse_peer(ctx, arg),
        None => Ok(NodeId::new(DEFAULT_PEER)),
    }
}

fn send_ack(ctx: &mut NodeContext<'_>, to: NodeId, number: u64) -> SimResult<()> {
    let ack = ctx.create_data_packet(to, format!("ACK {}", number).into_bytes());
    ctx.send_data(ack)
}

/// Sends `args[0]` 1000-byte packets to `args[1]` (node 2 when absent), one
/// at a time, each only after the previous one was acknowledged.
#[derive(Debug, Default)]
pub struct StopAndWaitSender {
    node: Option<NodeId>,
    peer: Option<NodeId>,
    total: u64,
    sent: u64,
    acked: u64,
}

impl StopAndWaitSender {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_next(&mut self, ctx: &mut NodeContext<'_>, peer: NodeId) -> SimResult<()> {
        let packet = ctx.create_data_packet(peer, vec![0; BULK_PAYLOAD]);
        info!(
            "stop-and-wait sender {} at {}: sent packet of size {}",
            ctx.node_id(),
            ctx.now(),
            packet.size()
        );
        ctx.send_data(packet)?;
        self.sent += 1;
        Ok(())
    }
}

impl ApplicationAlgorithm for StopAndWaitSender {
    fn name(&self) -> &str {
        "naive stop-and-wait sender"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        self.total = parse_total(ctx, args)?;
        let peer = parse_target(ctx, args)?;
        self.peer = Some(peer);
        if self.total > 0 {
            self.send_next(ctx, peer)?;
        }
        Ok(0)
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        self.acked += 1;
        info!(
            "stop-and-wait sender {} at {}: received \"{}\"",
            ctx.node_id(),
            ctx.now(),
            packet.payload_text()
        );
        match self.peer {
            Some(peer) if self.sent < self.total => self.send_next(ctx, peer)?,
            _ => {}
        }
        if self.acked == self.total {
            info!("stop-and-wait sender {} at {}: received last ack", ctx.node_id(), ctx.now());
        }
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!(
                "stop-and-wait sender {} at {}: sent {} acked {} of {}",
                node, now, self.sent, self.acked, self.total
            );
        }
    }
}

/// Acknowledges every data packet it receives.
#[derive(Debug, Default)]
pub struct StopAndWaitReceiver {
    node: Option<NodeId>,
    acked: u64,
}

impl StopAndWaitReceiver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for StopAndWaitReceiver {
    fn name(&self) -> &str {
        "naive stop-and-wait receiver"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, _args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        Ok(0)
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        info!(
            "stop-and-wait receiver {} at {}: received {} bytes",
            ctx.node_id(),
            ctx.now(),
            packet.size()
        );
        send_ack(ctx, packet.source(), self.acked)?;
        self.acked += 1;
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("stop-and-wait receiver {} at {}: acked {}", node, now, self.acked);
        }
    }
}

/// Sends `args[0]` 1000-byte packets to `args[1]` (node 2 when absent), at
/// most one per millisecond and at most `window` per round. An ack that
/// arrives once the window is full opens a new round twice as large.
#[derive(Debug)]
pub struct WindowSender {
    node: Option<NodeId>,
    peer: Option<NodeId>,
    total: u64,
    sent: u64,
    acked: u64,
    window: u64,
    sent_in_window: u64,
}

impl Default for WindowSender {
    fn default() -> Self {
        Self {
            node: None,
            peer: None,
            total: 0,
            sent: 0,
            acked: 0,
            window: 1,
            sent_in_window: 0,
        }
    }
}

impl WindowSender {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for WindowSender {
    fn name(&self) -> &str {
        "naive window sender"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        self.total = parse_total(ctx, args)?;
        self.peer = Some(parse_target(ctx, args)?);
        info!(
            "window sender {} at {}: transferring {} packets",
            ctx.node_id(),
            ctx.now(),
            self.total
        );
        Ok(1)
    }

    fn on_clock_tick(&mut self, ctx: &mut NodeContext<'_>) -> SimResult<()> {
        let Some(peer) = self.peer else {
            return Ok(());
        };
        if self.sent_in_window >= self.window || self.sent >= self.total {
            return Ok(());
        }
        self.sent += 1;
        self.sent_in_window += 1;
        let packet = ctx.create_data_packet(peer, vec![0; BULK_PAYLOAD]);
        info!("window sender {} at {}: sent packet {}", ctx.node_id(), ctx.now(), self.sent);
        ctx.send_data(packet)
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        self.acked += 1;
        info!(
            "window sender {} at {}: received \"{}\"",
            ctx.node_id(),
            ctx.now(),
            packet.payload_text()
        );
        if self.acked < self.total && self.sent_in_window == self.window {
            self.sent_in_window = 0;
            self.window = self.window.saturating_mul(2);
        }
        if self.acked == self.total && self.sent == self.total {
            info!("window sender {} at {}: all packets transferred", ctx.node_id(), ctx.now());
        }
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!(
                "window sender {} at {}: sent {} acked {} window {}",
                node, now, self.sent, self.acked, self.window
            );
        }
    }
}

/// Acknowledges every data packet with a running count. The optional
/// `args[0]` is the number of packets expected.
#[derive(Debug, Default)]
pub struct WindowReceiver {
    node: Option<NodeId>,
    expected: Option<u64>,
    received: u64,
}

impl WindowReceiver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationAlgorithm for WindowReceiver {
    fn name(&self) -> &str {
        "naive window receiver"
    }

    fn initialise(&mut self, ctx: &mut NodeContext<'_>, args: &[String]) -> SimResult<u64> {
        self.node = Some(ctx.node_id());
        if !args.is_empty() {
            self.expected = Some(parse_total(ctx, args)?);
        }
        Ok(0)
    }

    fn on_receive(&mut self, ctx: &mut NodeContext<'_>, packet: Packet) -> SimResult<()> {
        self.received += 1;
        send_ack(ctx, packet.source(), self.received)?;
        match self.expected {
            Some(total) if self.received == total => {
                info!(
                    "window receiver {} at {}: sent last ack {}",
                    ctx.node_id(),
                    ctx.now(),
                    self.received
                );
            }
            Some(total) if self.received > total => {
                info!("window receiver {} at {}: unexpected packet", ctx.node_id(), ctx.now());
            }
            _ => {
                info!(
                    "window receiver {} at {}: sent ack {}",
                    ctx.node_id(),
                    ctx.now(),
                    self.received
                );
            }
        }
        Ok(())
    }

    fn show_state(&self, now: u64) {
        if let Some(node) = self.node {
            info!("window receiver {} at {}: acked {}", node, now, self.received);
        }
    }
}
