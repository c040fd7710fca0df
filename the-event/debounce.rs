//! Utilities for declaring an async (usually debounced) hook

use std::time::Duration;

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Sender,
    error::TrySendError,
  },
  task::JoinHandle,
  time::Instant,
};

/// Maximum time to block when sending to a full channel.
/// Keep this very short: dropping an edit notification is preferable to
/// stalling the thread that dispatches edits.
const SEND_TIMEOUT_MS: u64 = 2;

/// Capacity of the event channel feeding a hook task.
const CHANNEL_CAPACITY: usize = 256;

/// Async hooks provide a convenient framework for implementing (debounced)
/// async event handlers. The hook runs as a background tokio task that waits
/// for events (usually an enum) to be sent through a channel, and for the
/// deadline it last asked for.
///
/// A hook may own several logical timers. It reports only the earliest of
/// them: `handle_event` and `finish_debounce` both return the next deadline
/// the task should wake up at, or `None` when nothing is scheduled.
pub trait AsyncHook: Send + 'static + Sized {
  type Event: Send + 'static;

  /// Called immediately whenever an event is received. `timeout` is the
  /// deadline that was pending when the event arrived. Returning a later
  /// instant resets the debounce, returning the same one continues it.
  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called whenever the pending deadline is reached. Returns the next
  /// deadline if more timed work is outstanding.
  fn finish_debounce(&mut self) -> Option<Instant>;

  /// Called once when every sender has been dropped, before the hook itself
  /// is dropped. Pending timers must be cancelled here.
  fn shutdown(&mut self) {}

  fn spawn(self) -> HookHandle<Self::Event> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    // only spawn worker if we are inside runtime to avoid having to spawn a runtime
    // for unrelated unit tests
    let task = tokio::runtime::Handle::try_current()
      .ok()
      .map(|handle| handle.spawn(run(self, rx)));
    HookHandle {
      tx: Some(tx),
      task,
    }
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: mpsc::Receiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(deadline_) => {
        let res = tokio::time::timeout_at(deadline_, rx.recv()).await;
        match res {
          Ok(event) => event,
          Err(_) => {
            deadline = hook.finish_debounce();
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }
  hook.shutdown();
}

/// Owning handle of a spawned hook task.
///
/// Dropping the handle closes the channel and aborts the task, so no timer
/// owned by the hook can fire after the owner is gone. Prefer
/// [`HookHandle::shutdown`] when the hook should observe the close and run
/// its own teardown.
#[derive(Debug)]
pub struct HookHandle<E> {
  tx:   Option<Sender<E>>,
  task: Option<JoinHandle<()>>,
}

impl<E> HookHandle<E> {
  /// The sender feeding the hook. `None` after shutdown.
  pub fn sender(&self) -> Option<&Sender<E>> {
    self.tx.as_ref()
  }

  /// Whether a task is actually running behind this handle.
  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|task| !task.is_finished())
  }

  /// Send an event without blocking the async caller for long.
  pub fn send(&self, event: E) {
    match &self.tx {
      Some(tx) => send_blocking(tx, event),
      None => log::warn!("Attempted to send to a hook that was shut down"),
    }
  }

  /// Close the channel and wait for the hook to run its teardown.
  pub async fn shutdown(mut self) {
    self.tx = None;
    if let Some(task) = self.task.take() {
      if let Err(err) = task.await {
        log::error!("hook task ended abnormally: {err}");
      }
    }
  }
}

impl<E> Drop for HookHandle<E> {
  fn drop(&mut self) {
    self.tx = None;
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}

/// Send an event to a channel, blocking only briefly if the channel is full.
///
/// This function is designed to be called from synchronous code that needs to
/// communicate with async tasks. It prioritizes responsiveness over reliability:
/// - First attempts a non-blocking send (fast path)
/// - If the channel is full, blocks for at most `SEND_TIMEOUT_MS` milliseconds
/// - If still full after timeout, the message is dropped
pub fn send_blocking<T>(tx: &Sender<T>, data: T) {
  match tx.try_send(data) {
    Ok(()) => {},
    Err(TrySendError::Full(data)) => {
      if block_on(tx.send_timeout(data, Duration::from_millis(SEND_TIMEOUT_MS))).is_err() {
        log::warn!("Dropped event: hook channel stayed full");
      }
    },
    Err(TrySendError::Closed(_)) => {
      log::warn!("Attempted to send to closed channel");
    },
  }
}

/// Try to send an event without blocking at all.
/// Returns true if the event was sent, false if the channel was full or closed.
pub fn try_send<T>(tx: &Sender<T>, data: T) -> bool {
  tx.try_send(data).is_ok()
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    Mutex,
  };

  use super::*;

  /// Collects events and publishes them as one batch after a quiet period.
  struct Batcher {
    quiet:    Duration,
    pending:  Vec<u32>,
    batches:  Arc<Mutex<Vec<Vec<u32>>>>,
    shutdown: Arc<Mutex<bool>>,
  }

  impl AsyncHook for Batcher {
    type Event = u32;

    fn handle_event(&mut self, event: u32, _timeout: Option<Instant>) -> Option<Instant> {
      self.pending.push(event);
      Some(Instant::now() + self.quiet)
    }

    fn finish_debounce(&mut self) -> Option<Instant> {
      let batch = std::mem::take(&mut self.pending);
      self.batches.lock().unwrap().push(batch);
      None
    }

    fn shutdown(&mut self) {
      self.pending.clear();
      *self.shutdown.lock().unwrap() = true;
    }
  }

  fn batcher() -> (Batcher, Arc<Mutex<Vec<Vec<u32>>>>, Arc<Mutex<bool>>) {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let shutdown = Arc::new(Mutex::new(false));
    let hook = Batcher {
      quiet:    Duration::from_millis(500),
      pending:  Vec::new(),
      batches:  batches.clone(),
      shutdown: shutdown.clone(),
    };
    (hook, batches, shutdown)
  }

  #[tokio::test(start_paused = true)]
  async fn rapid_events_flush_once_after_quiet_period() {
    let (hook, batches, _) = batcher();
    let handle = hook.spawn();
    for n in 0..5 {
      handle.send(n);
      tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(batches.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(*batches.lock().unwrap(), vec![vec![0, 1, 2, 3, 4]]);
    handle.shutdown().await;
  }

  #[tokio::test(start_paused = true)]
  async fn shutdown_runs_teardown_without_flushing() {
    let (hook, batches, shutdown) = batcher();
    let handle = hook.spawn();
    handle.send(7);
    tokio::task::yield_now().await;
    handle.shutdown().await;

    assert!(*shutdown.lock().unwrap());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(batches.lock().unwrap().is_empty());
  }

  #[test]
  fn spawn_outside_runtime_has_no_task() {
    let (hook, ..) = batcher();
    let handle = hook.spawn();
    assert!(!handle.is_running());
    assert!(handle.sender().is_some());
  }

  #[test]
  fn try_send_reports_closed_channel() {
    let (tx, rx) = mpsc::channel::<u8>(1);
    assert!(try_send(&tx, 1));
    assert!(!try_send(&tx, 2));
    drop(rx);
    assert!(!try_send(&tx, 3));
  }
}
