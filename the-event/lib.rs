//! Event plumbing shared by the inspector crates.
//!
//! Currently this is only the debounced [`AsyncHook`] runtime: a background
//! task that owns some state, receives events through a bounded channel and
//! wakes up at the deadlines the state asks for.

mod debounce;

pub use debounce::{
  AsyncHook,
  HookHandle,
  send_blocking,
  try_send,
};
