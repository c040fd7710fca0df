//! Timed walk through the stages of an edit.
//!
//! The animator highlights one [`LifecycleStep`] at a time: capture of the
//! input, construction of the transaction, application to the state, and the
//! view update. Each step is held for its own duration, then the next one
//! becomes active; after the last step the animator returns to idle.
//!
//! ```text
//!            trigger                 hold elapsed            last hold elapsed
//!   Idle ─────────────▶ Running(0) ───────────────▶ … ───▶ Running(K-1) ──────▶ Idle
//!                          │  ▲
//!                   pause  │  │ resume
//!                          ▼  │
//!                        Paused(i)
//! ```
//!
//! A trigger that arrives while running does not queue a second cycle. It
//! (re)arms a restart timer, and once triggers have been quiet for the
//! restart delay the cycle starts over from step 0. Both timers live in the
//! animator and are cancelled by [`Animator::interrupt`].
//!
//! With no steps configured, every operation that would start a cycle is a
//! no-op.

use std::time::{
  Duration,
  Instant,
};

use serde::{
  Deserialize,
  Serialize,
};

use crate::timer::{
  Timer,
  earliest,
};

/// Quiet period before repeated triggers restart the cycle.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LifecycleStep {
  pub id:          String,
  pub label:       String,
  #[serde(default)]
  pub description: String,
  pub hold_ms:     u64,
}

impl LifecycleStep {
  pub fn new(id: &str, label: &str, description: &str, hold_ms: u64) -> Self {
    Self {
      id: id.to_string(),
      label: label.to_string(),
      description: description.to_string(),
      hold_ms,
    }
  }

  pub fn hold(&self) -> Duration {
    Duration::from_millis(self.hold_ms)
  }
}

/// The four stages shown for every edit. `apply` holds longer so there is
/// time to read the diff.
pub fn default_steps() -> Vec<LifecycleStep> {
  vec![
    LifecycleStep::new(
      "capture",
      "Input captured",
      "A keystroke, paste or command reaches the editor.",
      1600,
    ),
    LifecycleStep::new(
      "transaction",
      "Transaction built",
      "The input is turned into steps.",
      1600,
    ),
    LifecycleStep::new(
      "apply",
      "State applied",
      "The steps produce a new immutable state.",
      2800,
    ),
    LifecycleStep::new(
      "render",
      "View updated",
      "The view reconciles the rendered output with the new state.",
      1600,
    ),
  ]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum AnimationState {
  #[default]
  Idle,
  Running(usize),
  Paused(usize),
}

impl AnimationState {
  pub fn step(self) -> Option<usize> {
    match self {
      Self::Idle => None,
      Self::Running(step) | Self::Paused(step) => Some(step),
    }
  }
}

/// One transition of the active step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepChange {
  pub from: Option<usize>,
  pub to:   Option<usize>,
}

#[derive(Debug)]
pub struct Animator {
  steps:         Vec<LifecycleStep>,
  restart_delay: Duration,
  enabled:       bool,
  state:         AnimationState,
  step_timer:    Timer,
  restart_timer: Timer,
}

impl Default for Animator {
  fn default() -> Self {
    Self::new(default_steps(), DEFAULT_RESTART_DELAY)
  }
}

impl Animator {
  pub fn new(steps: Vec<LifecycleStep>, restart_delay: Duration) -> Self {
    Self {
      steps,
      restart_delay,
      enabled: true,
      state: AnimationState::Idle,
      step_timer: Timer::new(),
      restart_timer: Timer::new(),
    }
  }

  pub fn steps(&self) -> &[LifecycleStep] {
    &self.steps
  }

  pub fn state(&self) -> AnimationState {
    self.state
  }

  pub fn active_step(&self) -> Option<usize> {
    self.state.step()
  }

  pub fn current(&self) -> Option<&LifecycleStep> {
    self.active_step().and_then(|step| self.steps.get(step))
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    earliest(self.step_timer.deadline(), self.restart_timer.deadline())
  }

  /// Start a cycle, or schedule a restart if one is already running. A
  /// paused or highlighted step is left for a fresh cycle. Ignored while
  /// disabled.
  pub fn trigger(&mut self, now: Instant) -> Option<StepChange> {
    if !self.enabled || self.steps.is_empty() {
      return None;
    }
    match self.state {
      AnimationState::Running(_) => {
        self.restart_timer.arm_after(now, self.restart_delay);
        None
      },
      AnimationState::Idle | AnimationState::Paused(_) => {
        self.restart_timer.cancel();
        Some(self.enter(0, now))
      },
    }
  }

  /// Restart from the first step immediately. Works even while disabled.
  pub fn replay(&mut self, now: Instant) -> Option<StepChange> {
    if self.steps.is_empty() {
      return None;
    }
    self.restart_timer.cancel();
    Some(self.enter(0, now))
  }

  /// Advance on expired timers. At most one transition happens per call.
  pub fn poll(&mut self, now: Instant) -> Option<StepChange> {
    if self.restart_timer.fire(now) {
      return Some(self.enter(0, now));
    }
    if !self.step_timer.fire(now) {
      return None;
    }
    let AnimationState::Running(step) = self.state else {
      return None;
    };
    if step + 1 < self.steps.len() {
      Some(self.enter(step + 1, now))
    } else {
      Some(self.set(AnimationState::Idle))
    }
  }

  /// Return to idle and cancel every pending timer.
  pub fn interrupt(&mut self) -> Option<StepChange> {
    self.step_timer.cancel();
    self.restart_timer.cancel();
    (self.state != AnimationState::Idle).then(|| self.set(AnimationState::Idle))
  }

  /// Freeze on the current step. Returns whether the animation was running.
  pub fn pause(&mut self) -> bool {
    let AnimationState::Running(step) = self.state else {
      return false;
    };
    self.step_timer.cancel();
    self.restart_timer.cancel();
    self.state = AnimationState::Paused(step);
    true
  }

  /// Continue a paused cycle; the current step gets its full hold again.
  pub fn resume(&mut self, now: Instant) -> bool {
    let AnimationState::Paused(step) = self.state else {
      return false;
    };
    if !self.enabled {
      self.interrupt();
      return false;
    }
    self.enter(step, now);
    true
  }

  /// Show one step without advancing. The automatic cycle is stopped.
  pub fn highlight(&mut self, step: usize) -> Option<StepChange> {
    if step >= self.steps.len() {
      return None;
    }
    self.step_timer.cancel();
    self.restart_timer.cancel();
    Some(self.set(AnimationState::Paused(step)))
  }

  pub fn set_enabled(&mut self, enabled: bool) -> Option<StepChange> {
    self.enabled = enabled;
    if enabled { None } else { self.interrupt() }
  }

  /// Flip whether new transactions trigger a cycle. Returns the new setting.
  pub fn toggle_enabled(&mut self) -> bool {
    self.set_enabled(!self.enabled);
    self.enabled
  }

  fn enter(&mut self, step: usize, now: Instant) -> StepChange {
    let hold = self.steps[step].hold();
    self.step_timer.arm_after(now, hold);
    self.set(AnimationState::Running(step))
  }

  fn set(&mut self, state: AnimationState) -> StepChange {
    let change = StepChange {
      from: self.state.step(),
      to:   state.step(),
    };
    tracing::trace!(?change, "lifecycle step");
    self.state = state;
    change
  }
}
