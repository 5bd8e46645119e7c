//! Single-shot, rearmable deadlines for actor loops.
//!
//! A [`Debouncer`] collapses a burst of events into one action: every
//! [`arm`](Debouncer::arm) pushes the deadline out by the configured delay,
//! and the owning actor performs the action once the deadline passes.
//! Actors report [`Debouncer::deadline`] from `Actor::next_deadline`.

use std::time::{Duration, Instant};

/// A rearmable one-shot deadline.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the delay. An armed deadline keeps its current instant.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Arm (or re-arm) the deadline at `now + delay`.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Arm only if not already armed. Returns true if this call armed it.
    pub fn arm_if_idle(&mut self) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.arm();
        true
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }

    /// Disarm and return true if the deadline has passed.
    pub fn take_if_expired(&mut self, now: Instant) -> bool {
        if self.is_expired(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

/// The earliest of several optional deadlines.
pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}
