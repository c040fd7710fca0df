//! The inspector as a background hook task with real timers.
//!
//! Inputs are sent through the hook's channel at their offsets; the hook
//! wakes up at whatever deadline the inspector reports next. The state is
//! shared behind a lock so the driver can watch it settle.

use std::sync::Arc;

use parking_lot::RwLock;
use the_event::AsyncHook;
use the_lib::{
  config::Config,
  inspector::Inspector,
};
use tokio::{
  sync::Notify,
  time::Instant,
};

use crate::{
  runner::{
    Run,
    Trace,
    apply_input,
    trace_events,
  },
  script::{
    Input,
    Timeline,
  },
};

#[derive(Debug)]
struct ServiceState {
  inspector: Inspector,
  trace:     Trace,
  started:   Instant,
  handled:   usize,
}

impl ServiceState {
  fn next_deadline(&self) -> Option<Instant> {
    self.inspector.next_deadline().map(Instant::from_std)
  }
}

struct InspectorHook {
  state:  Arc<RwLock<ServiceState>>,
  notify: Arc<Notify>,
}

impl AsyncHook for InspectorHook {
  type Event = Input;

  fn handle_event(&mut self, input: Input, _timeout: Option<Instant>) -> Option<Instant> {
    let now = Instant::now();
    let mut state = self.state.write();
    let at = now.duration_since(state.started);
    let events = apply_input(&mut state.inspector, input, now.into_std());
    state.trace.extend(at, events);
    state.handled += 1;
    let next = state.next_deadline();
    drop(state);
    self.notify.notify_one();
    next
  }

  fn finish_debounce(&mut self) -> Option<Instant> {
    let now = Instant::now();
    let mut state = self.state.write();
    let at = now.duration_since(state.started);
    let events = state.inspector.poll(now.into_std());
    let events = trace_events(&state.inspector, events);
    state.trace.extend(at, events);
    let next = state.next_deadline();
    drop(state);
    self.notify.notify_one();
    next
  }

  fn shutdown(&mut self) {
    let now = Instant::now();
    let mut state = self.state.write();
    let at = now.duration_since(state.started);
    let events = state.inspector.teardown();
    let events = trace_events(&state.inspector, events);
    state.trace.extend(at, events);
  }
}

/// Send every input at its offset, wait until the inspector has no timer
/// left, then shut the hook down.
pub async fn run_realtime(config: Config, timeline: Timeline) -> Run {
  let started = Instant::now();
  let state = Arc::new(RwLock::new(ServiceState {
    inspector: Inspector::new(config),
    trace: Trace::default(),
    started,
    handled: 0,
  }));
  let notify = Arc::new(Notify::new());
  let handle = InspectorHook {
    state:  state.clone(),
    notify: notify.clone(),
  }
  .spawn();

  let mut sent = 0;
  for timed in timeline.inputs {
    tokio::time::sleep_until(started + timed.at).await;
    let Some(tx) = handle.sender() else {
      break;
    };
    if tx.send(timed.input).await.is_err() {
      log::error!("inspector task stopped before the script finished");
      break;
    }
    sent += 1;
  }
  tokio::time::sleep_until(started + timeline.end).await;

  loop {
    let notified = notify.notified();
    {
      let state = state.read();
      if state.handled >= sent && state.next_deadline().is_none() {
        break;
      }
    }
    notified.await;
  }
  let elapsed = started.elapsed();
  handle.shutdown().await;

  let mut state = state.write();
  log::info!(
    "realtime run finished after {}ms with {} records logged",
    elapsed.as_millis(),
    state.inspector.log().len()
  );
  Run {
    inspector: std::mem::take(&mut state.inspector),
    trace: std::mem::take(&mut state.trace),
    elapsed,
  }
}
