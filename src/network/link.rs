// Physical link between two (node, interface) endpoints.
// Each side has its own output queue; transmit() turns queued packets into
// timed delivery events for the far side.

use super::{Interface, NodeId, Packet};
use crate::error::{SimError, SimResult};
use crate::simulation::event::Event;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

const DROP_SEED_BASE: u64 = 10_000;
const JITTER_SEED_BASE: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: NodeId,
    pub interface: usize,
}

impl Endpoint {
    pub fn new(node: u32, interface: usize) -> Self {
        Self {
            node: NodeId::new(node),
            interface,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.interface)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub sent_a: u64,
    pub received_a: u64,
    pub sent_b: u64,
    pub received_b: u64,
    pub lost: u64,
}

#[derive(Debug, Clone, Default)]
struct Direction {
    queue: VecDeque<Packet>,
    // when the last bit queued on this side finishes serializing
    busy_until: u64,
}

#[derive(Debug, Clone)]
pub struct Link {
    endpoints: [Endpoint; 2],
    bandwidth_bps: u64,
    latency_ms: u64,
    error_rate: f64,
    jitter: f64,
    up: bool,
    directions: [Direction; 2],
    deliveries: VecDeque<Event>,
    stats: LinkStats,
    loss: Option<Bernoulli>,
    drop_rng: ChaCha8Rng,
    jitter_rng: ChaCha8Rng,
}

impl Link {
    /// `error_rate` is a probability in [0, 1]; `jitter` is a fraction of the
    /// serialization delay. `seed` shifts both generators, so the same seed
    /// reproduces the same losses and jitter.
    pub fn new(
        a: Endpoint,
        b: Endpoint,
        bandwidth_bps: u64,
        latency_ms: u64,
        error_rate: f64,
        jitter: f64,
        seed: u64,
    ) -> Self {
        let base = u64::from(a.node.raw())
            + u64::from(b.node.raw())
            + a.interface as u64
            + b.interface as u64
            + seed;
        let loss = if error_rate > 0.0 {
            Bernoulli::new(error_rate.min(1.0)).ok()
        } else {
            None
        };
        Self {
            endpoints: [a, b],
            bandwidth_bps: bandwidth_bps.max(1),
            latency_ms,
            error_rate,
            jitter: jitter.max(0.0),
            up: true,
            directions: Default::default(),
            deliveries: VecDeque::new(),
            stats: LinkStats::default(),
            loss,
            drop_rng: ChaCha8Rng::seed_from_u64(DROP_SEED_BASE.wrapping_add(base)),
            jitter_rng: ChaCha8Rng::seed_from_u64(JITTER_SEED_BASE.wrapping_add(base)),
        }
    }

    pub fn endpoint(&self, side: Side) -> Endpoint {
        self.endpoints[side.index()]
    }

    /// Which side `node.interface` sits on, if any.
    pub fn side_of(&self, endpoint: Endpoint) -> Option<Side> {
        if self.endpoints[0] == endpoint {
            Some(Side::A)
        } else if self.endpoints[1] == endpoint {
            Some(Side::B)
        } else {
            None
        }
    }

    /// True if this link joins the two endpoints, in either order.
    pub fn joins(&self, x: Endpoint, y: Endpoint) -> bool {
        (self.endpoints[0] == x && self.endpoints[1] == y)
            || (self.endpoints[0] == y && self.endpoints[1] == x)
    }

    pub fn bandwidth_bps(&self) -> u64 {
        self.bandwidth_bps
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn queue_len(&self, side: Side) -> usize {
        self.directions[side.index()].queue.len()
    }

    /// Going down discards everything still waiting to be transmitted.
    pub fn set_state(&mut self, up: bool) {
        self.up = up;
        if !up {
            for dir in &mut self.directions {
                dir.queue.clear();
            }
        }
    }

    /// Queue a packet for transmission from `side`. No-op while down.
    pub fn enqueue(&mut self, side: Side, packet: Packet) {
        if !self.up {
            return;
        }
        match side {
            Side::A => self.stats.sent_a += 1,
            Side::B => self.stats.sent_b += 1,
        }
        self.directions[side.index()].queue.push_back(packet);
    }

    /// Serialization delay in whole milliseconds, rounded up.
    pub fn serialization_delay_ms(&self, size_bits: u64) -> u64 {
        size_bits.saturating_mul(1000).div_ceil(self.bandwidth_bps)
    }

    /// Drain both output queues into delivery events.
    pub fn transmit(&mut self, now: u64) -> SimResult<()> {
        if self.up {
            self.drain_side(Side::A, now);
            self.drain_side(Side::B, now);
        } else {
            self.set_state(false);
        }

        if self.directions.iter().any(|d| !d.queue.is_empty()) {
            return Err(SimError::TransmitQueueNotEmpty {
                link: self.to_string(),
            });
        }
        Ok(())
    }

    fn drain_side(&mut self, side: Side, now: u64) {
        let far = self.endpoint(side.opposite());
        let mut dir = std::mem::take(&mut self.directions[side.index()]);
        dir.busy_until = dir.busy_until.max(now);

        while let Some(packet) = dir.queue.pop_front() {
            if let Some(loss) = &self.loss {
                if loss.sample(&mut self.drop_rng) {
                    self.stats.lost += 1;
                    debug!("link {} lost packet ({})", self, packet);
                    continue;
                }
            }

            let serialization = self.serialization_delay_ms(packet.size_bits());
            let jitter = if self.jitter > 0.0 {
                let u: f64 = self.jitter_rng.r#gen();
                (u * self.jitter * serialization as f64) as u64
            } else {
                0
            };
            // at least 1ms so the delivery always lands in a later tick
            let transit = serialization
                .saturating_add(self.latency_ms)
                .saturating_add(jitter)
                .max(1);
            // an overflowing delivery time lands past any stop time
            let deliver_at = dir.busy_until.saturating_add(transit);
            dir.busy_until = dir.busy_until.saturating_add(serialization);

            match side.opposite() {
                Side::A => self.stats.received_a += 1,
                Side::B => self.stats.received_b += 1,
            }
            debug!(
                "link {} delivers to {} at {} ({}ms transit)",
                self, far, deliver_at, transit
            );
            self.deliveries.push_back(Event::delivery(
                deliver_at,
                packet,
                far.node,
                Interface::Port(far.interface),
            ));
        }

        self.directions[side.index()] = dir;
    }

    pub fn drain_deliveries(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.deliveries.drain(..)
    }

    /// One line per side, in the style of a node packet dump.
    pub fn stats_line(&self) -> String {
        let [a, b] = self.endpoints;
        format!(
            "  (node:{} ifc:{}) r {} s {} <--> (node:{} ifc:{}) r {} s {} lost {}",
            a.node,
            a.interface,
            self.stats.received_a,
            self.stats.sent_a,
            b.node,
            b.interface,
            self.stats.received_b,
            self.stats.sent_b,
            self.stats.lost
        )
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <--> {} bwd {} bps lat {} ms err {} jit {} {}",
            self.endpoints[0],
            self.endpoints[1],
            self.bandwidth_bps,
            self.latency_ms,
            self.error_rate,
            self.jitter,
            if self.up { "up" } else { "down" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::packet::HEADER_SIZE;

    fn link(bandwidth: u64, latency: u64, error: f64, jitter: f64) -> Link {
        Link::new(
            Endpoint::new(1, 0),
            Endpoint::new(2, 0),
            bandwidth,
            latency,
            error,
            jitter,
            0,
        )
    }

    // total packet size of `bytes` including the header
    fn packet_of(bytes: usize) -> Packet {
        Packet::data(NodeId::new(1), NodeId::new(2), vec![0; bytes - HEADER_SIZE])
    }

    #[test]
    fn test_transit_time_without_noise() {
        let mut l = link(1_000_000, 10, 0.0, 0.0);
        l.enqueue(Side::A, packet_of(1000));
        l.transmit(0).unwrap();

        let events: Vec<_> = l.drain_deliveries().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 18);
        assert_eq!(events[0].node, Some(NodeId::new(2)));
        assert_eq!(events[0].interface, Some(Interface::Port(0)));
    }

    #[test]
    fn test_serialization_rounds_up() {
        let l = link(1_000_000, 0, 0.0, 0.0);
        assert_eq!(l.serialization_delay_ms(8000), 8);
        assert_eq!(l.serialization_delay_ms(8001), 9);
        assert_eq!(l.serialization_delay_ms(0), 0);
    }

    #[test]
    fn test_minimum_transit_is_one_ms() {
        let mut l = link(1_000_000_000, 0, 0.0, 0.0);
        l.enqueue(Side::B, packet_of(HEADER_SIZE));
        l.transmit(5).unwrap();

        let events: Vec<_> = l.drain_deliveries().collect();
        assert_eq!(events[0].time, 6);
        assert_eq!(events[0].node, Some(NodeId::new(1)));
    }

    #[test]
    fn test_serialization_accumulates_per_side() {
        let mut l = link(1_000_000, 10, 0.0, 0.0);
        l.enqueue(Side::A, packet_of(1000));
        l.enqueue(Side::A, packet_of(1000));
        l.enqueue(Side::B, packet_of(1000));
        l.transmit(0).unwrap();

        let times: Vec<_> = l.drain_deliveries().map(|e| e.time).collect();
        // side A: 0+18, 8+18; side B starts fresh
        assert_eq!(times, vec![18, 26, 18]);
    }

    #[test]
    fn test_busy_carries_into_next_tick() {
        let mut l = link(1_000_000, 0, 0.0, 0.0);
        l.enqueue(Side::A, packet_of(1000));
        l.enqueue(Side::A, packet_of(1000));
        l.transmit(0).unwrap();
        l.drain_deliveries().for_each(drop);

        // still serializing until t=16
        l.enqueue(Side::A, packet_of(1000));
        l.transmit(3).unwrap();
        let times: Vec<_> = l.drain_deliveries().map(|e| e.time).collect();
        assert_eq!(times, vec![24]);
    }

    #[test]
    fn test_down_clears_queues_and_ignores_enqueue() {
        let mut l = link(1_000_000, 10, 0.0, 0.0);
        l.enqueue(Side::A, packet_of(100));
        l.enqueue(Side::B, packet_of(100));
        l.set_state(false);
        assert_eq!(l.queue_len(Side::A), 0);
        assert_eq!(l.queue_len(Side::B), 0);

        l.enqueue(Side::A, packet_of(100));
        assert_eq!(l.queue_len(Side::A), 0);

        l.transmit(1).unwrap();
        assert_eq!(l.drain_deliveries().count(), 0);
        assert_eq!(l.stats().sent_a, 1);
        assert_eq!(l.stats().received_b, 0);
    }

    #[test]
    fn test_full_error_rate_drops_everything() {
        let mut l = link(1_000_000, 10, 1.0, 0.0);
        for _ in 0..20 {
            l.enqueue(Side::A, packet_of(100));
        }
        l.transmit(0).unwrap();
        assert_eq!(l.drain_deliveries().count(), 0);
        assert_eq!(l.stats().lost, 20);
        assert_eq!(l.queue_len(Side::A), 0);
    }

    #[test]
    fn test_jitter_is_bounded_and_reproducible() {
        let run = || {
            let mut l = link(100_000, 5, 0.0, 0.5);
            for _ in 0..50 {
                l.enqueue(Side::A, packet_of(1000));
            }
            l.transmit(0).unwrap();
            l.drain_deliveries().map(|e| e.time).collect::<Vec<_>>()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);

        // 80ms serialization each, jitter below 40ms
        for (i, t) in first.iter().enumerate() {
            let base = i as u64 * 80 + 80 + 5;
            assert!(*t >= base && *t < base + 40, "delivery {} at {}", i, t);
        }
    }

    #[test]
    fn test_huge_jitter_and_latency_saturate() {
        let mut l = link(1, 10, 0.0, 1e300);
        l.enqueue(Side::A, packet_of(1000));
        l.enqueue(Side::A, packet_of(1000));
        l.transmit(0).unwrap();
        let times: Vec<_> = l.drain_deliveries().map(|e| e.time).collect();
        assert_eq!(times, vec![u64::MAX, u64::MAX]);

        let mut l = link(1_000_000, u64::MAX - 5, 0.0, 0.0);
        l.enqueue(Side::B, packet_of(1000));
        l.transmit(100).unwrap();
        assert_eq!(l.drain_deliveries().next().map(|e| e.time), Some(u64::MAX));
    }

    #[test]
    fn test_losses_are_reproducible() {
        let run = |seed| {
            let mut l = Link::new(
                Endpoint::new(1, 0),
                Endpoint::new(2, 0),
                1_000_000,
                1,
                0.3,
                0.0,
                seed,
            );
            for i in 0..100 {
                let mut p = packet_of(100);
                p.set_sequence(i);
                l.enqueue(Side::A, p);
            }
            l.transmit(0).unwrap();
            l.drain_deliveries()
                .map(|e| e.packet.map(|p| p.sequence()).unwrap_or_default())
                .collect::<Vec<_>>()
        };
        let a = run(0);
        assert_eq!(a, run(0));
        assert!(a.len() < 100 && !a.is_empty());
    }

    #[test]
    fn test_sides_and_joins() {
        let l = link(1, 0, 0.0, 0.0);
        assert_eq!(l.side_of(Endpoint::new(1, 0)), Some(Side::A));
        assert_eq!(l.side_of(Endpoint::new(2, 0)), Some(Side::B));
        assert_eq!(l.side_of(Endpoint::new(3, 0)), None);
        assert!(l.joins(Endpoint::new(2, 0), Endpoint::new(1, 0)));
        assert!(!l.joins(Endpoint::new(1, 0), Endpoint::new(1, 0)));
    }
}
