//! Global time-ordered event queue.
//!
//! Events are keyed by `(time, sequence)`. The sequence is minted here on
//! every push and is strictly increasing, so events due at the same
//! millisecond come out in the order they were enqueued. Events scheduled
//! past the horizon (the configured stop time) are silently discarded.

use std::collections::BTreeMap;

use super::event::Event;

#[derive(Debug, Clone)]
pub struct EventQueue {
    events: BTreeMap<(u64, u64), Event>,
    next_sequence: u64,
    horizon: u64,
    discarded: u64,
}

impl EventQueue {
    pub fn new(horizon: u64) -> Self {
        Self {
            events: BTreeMap::new(),
            next_sequence: 0,
            horizon,
            discarded: 0,
        }
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    /// Stamp the event with a fresh sequence number and queue it.
    ///
    /// Returns the sequence number, or `None` if the event falls beyond
    /// the horizon and was dropped.
    pub fn push(&mut self, mut event: Event) -> Option<u64> {
        if event.time > self.horizon {
            self.discarded += 1;
            return None;
        }
        self.next_sequence += 1;
        event.sequence = self.next_sequence;
        self.events.insert((event.time, event.sequence), event);
        Some(self.next_sequence)
    }

    /// Events dropped so far for falling past the horizon.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn next_time(&self) -> Option<u64> {
        self.events.first_key_value().map(|((time, _), _)| *time)
    }

    /// Pop the earliest event if it is due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Event> {
        match self.next_time() {
            Some(time) if time <= now => self.events.pop_first().map(|(_, event)| event),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
