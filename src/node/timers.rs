// Per-plane timer bookkeeping. Nothing is ever removed from the event
// queue: a timer event is honoured only if its time still matches the
// expected value recorded here, so re-arming or cancelling just overwrites.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Plane {
    Control,
    Application,
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Control => write!(f, "control"),
            Plane::Application => write!(f, "application"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaneTimers {
    next_timeout: Option<u64>,
    next_clock_tick: Option<u64>,
    clock_period: Option<u64>,
}

impl PlaneTimers {
    pub fn arm_timeout(&mut self, at: u64) {
        self.next_timeout = Some(at);
    }

    pub fn cancel_timeout(&mut self) {
        self.next_timeout = None;
    }

    pub fn expected_timeout(&self) -> Option<u64> {
        self.next_timeout
    }

    /// Consume the timeout if `at` is still the expected firing time.
    pub fn take_timeout(&mut self, at: u64) -> bool {
        if self.next_timeout == Some(at) {
            self.next_timeout = None;
            true
        } else {
            false
        }
    }

    /// Record the periodic tick; a period of zero means none was requested.
    pub fn set_clock_period(&mut self, period: u64) {
        self.clock_period = (period > 0).then_some(period);
    }

    pub fn clock_period(&self) -> Option<u64> {
        self.clock_period
    }

    /// Arm the next clock tick relative to `now`, if a period is set.
    pub fn arm_clock_tick(&mut self, now: u64) -> Option<u64> {
        self.next_clock_tick = self.clock_period.map(|p| now + p);
        self.next_clock_tick
    }

    pub fn expected_clock_tick(&self) -> Option<u64> {
        self.next_clock_tick
    }

    pub fn take_clock_tick(&mut self, at: u64) -> bool {
        if self.next_clock_tick == Some(at) {
            self.next_clock_tick = None;
            true
        } else {
            false
        }
    }
}
