//! Per-turn countdown gating interception.
//!
//! The timer is driven by the caller's clock: `start` and `poll` take `now`,
//! so the session loop and tests decide how time advances.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerUpdate {
    /// Whole seconds left, rounded up. Reported once per change.
    Tick(u32),
    /// Deadline passed; reported once per turn.
    Armed,
}

#[derive(Debug, Default)]
pub struct TurnTimer {
    deadline: Option<Instant>,
    armed: bool,
    last_reported: Option<u32>,
}

impl TurnTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disarm and schedule a fresh deadline. Last call wins.
    pub fn start(&mut self, now: Instant, duration: Duration) {
        self.deadline = Some(now + duration);
        self.armed = false;
        self.last_reported = None;
    }

    /// Drop any deadline without arming.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.armed = false;
        self.last_reported = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn seconds_remaining(&self, now: Instant) -> u32 {
        match self.deadline {
            Some(deadline) => {
                let millis = deadline.saturating_duration_since(now).as_millis();
                millis.div_ceil(1000) as u32
            }
            None => 0,
        }
    }

    /// Advance to `now`, arming once the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<TimerUpdate> {
        let deadline = self.deadline?;

        if now >= deadline {
            self.deadline = None;
            self.armed = true;
            self.last_reported = Some(0);
            return Some(TimerUpdate::Armed);
        }

        let remaining = self.seconds_remaining(now);
        if self.last_reported == Some(remaining) {
            return None;
        }
        self.last_reported = Some(remaining);
        Some(TimerUpdate::Tick(remaining))
    }
}
