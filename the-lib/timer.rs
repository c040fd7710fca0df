//! Single-slot deadline timers.
//!
//! A [`Timer`] is the only way the scheduler and the animator keep time. It
//! holds at most one deadline: arming it replaces the previous deadline,
//! so a component can never leak a second live timer. Nothing fires on its
//! own; the owner asks [`Timer::fire`] whether the deadline has passed for a
//! given `now`, which keeps every state machine deterministic under test.
//! Dropping the owner drops the deadline with it.

use std::time::{
  Duration,
  Instant,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Timer {
  deadline: Option<Instant>,
}

impl Timer {
  pub const fn new() -> Self {
    Self { deadline: None }
  }

  /// Arm the timer at `deadline`, returning the deadline it replaced.
  pub fn arm(&mut self, deadline: Instant) -> Option<Instant> {
    self.deadline.replace(deadline)
  }

  /// Arm the timer `delay` after `now`.
  pub fn arm_after(&mut self, now: Instant, delay: Duration) -> Instant {
    let deadline = now + delay;
    self.deadline = Some(deadline);
    deadline
  }

  /// Disarm the timer. Returns whether a deadline was pending.
  pub fn cancel(&mut self) -> bool {
    self.deadline.take().is_some()
  }

  #[inline]
  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  #[inline]
  pub fn is_armed(&self) -> bool {
    self.deadline.is_some()
  }

  /// Whether the deadline has passed, without consuming it.
  pub fn is_due(&self, now: Instant) -> bool {
    self.deadline.is_some_and(|deadline| deadline <= now)
  }

  /// Consume the deadline if it has passed.
  pub fn fire(&mut self, now: Instant) -> bool {
    if self.is_due(now) {
      self.deadline = None;
      true
    } else {
      false
    }
  }
}

/// Earliest of two optional deadlines.
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.min(b)),
    (a, b) => a.or(b),
  }
}
