// sluice/src/core/next.rs

//! Defines `Next<V, Err>`, the continuation handed to continuation-style stages.

use crate::core::values::Values;
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{event, Level};

pub(crate) type Settlement<V, Err> = oneshot::Receiver<Result<Values<V>, Err>>;

/// Error-first continuation for a single stage invocation.
///
/// Only the first completion has an effect: it is forwarded verbatim to the
/// pipeline, every later one is dropped. `Next` is cheap to clone so a stage
/// can move it into spawned work, timers, or several racing branches; all
/// clones share the same once-guard.
///
/// Dropping every clone without completing abandons the stage, which the
/// pipeline reports as `SluiceError::Abandoned`.
pub struct Next<V, Err> {
  stage_index: usize,
  shared: Arc<Shared<V, Err>>,
}

struct Shared<V, Err> {
  sender: Mutex<Option<oneshot::Sender<Result<Values<V>, Err>>>>,
  // Thread running the stage body, while it runs.
  invoking_thread: Mutex<Option<ThreadId>>,
  completed_inline: AtomicBool,
}

impl<V, Err> Next<V, Err> {
  pub(crate) fn channel(stage_index: usize) -> (Self, Settlement<V, Err>) {
    let (tx, rx) = oneshot::channel();
    let next = Self {
      stage_index,
      shared: Arc::new(Shared {
        sender: Mutex::new(Some(tx)),
        invoking_thread: Mutex::new(None),
        completed_inline: AtomicBool::new(false),
      }),
    };
    (next, rx)
  }

  /// Marks the current thread as running the stage body.
  pub(crate) fn enter_inline(&self) {
    *self.shared.invoking_thread.lock() = Some(thread::current().id());
  }

  /// Ends the inline section; returns whether the stage completed from
  /// within it, on the thread that called [`Next::enter_inline`].
  pub(crate) fn exit_inline(&self) -> bool {
    self.shared.invoking_thread.lock().take();
    self.shared.completed_inline.load(Ordering::SeqCst)
  }

  /// Completes the stage with `outcome`.
  ///
  /// Returns `true` if this call was the effective completion, `false` if the
  /// stage had already completed and the outcome was dropped.
  pub fn call(&self, outcome: Result<Values<V>, Err>) -> bool {
    // Take the sender out first so the lock is not held while sending.
    let sender = self.shared.sender.lock().take();
    match sender {
      Some(tx) => {
        if *self.shared.invoking_thread.lock() == Some(thread::current().id()) {
          self.shared.completed_inline.store(true, Ordering::SeqCst);
        }
        if tx.send(outcome).is_err() {
          event!(Level::TRACE, stage_index = self.stage_index, "Completion arrived after the run was dropped.");
        }
        true
      }
      None => {
        event!(
          Level::TRACE,
          stage_index = self.stage_index,
          failed = outcome.is_err(),
          "Ignoring repeated stage completion."
        );
        false
      }
    }
  }

  /// Completes the stage successfully with `values`.
  pub fn resolve(&self, values: Values<V>) -> bool {
    self.call(Ok(values))
  }

  /// Completes the stage successfully with a single value.
  pub fn resolve_one(&self, value: V) -> bool {
    self.call(Ok(vec![Some(value)]))
  }

  /// Completes the stage without output; the incoming values flow on unchanged.
  pub fn pass(&self) -> bool {
    self.call(Ok(Vec::new()))
  }

  /// Fails the stage, short-circuiting the rest of the pipeline.
  pub fn reject(&self, error: impl Into<Err>) -> bool {
    self.call(Err(error.into()))
  }

  /// Whether the stage has already completed through any clone of this handle.
  pub fn is_called(&self) -> bool {
    self.shared.sender.lock().is_none()
  }

  /// Position of the stage this continuation belongs to.
  pub fn stage_index(&self) -> usize {
    self.stage_index
  }
}

impl<V, Err> Clone for Next<V, Err> {
  fn clone(&self) -> Self {
    Self {
      stage_index: self.stage_index,
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<V, Err> fmt::Debug for Next<V, Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Next")
      .field("stage_index", &self.stage_index)
      .field("called", &self.is_called())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::executor::block_on;

  #[test]
  fn only_the_first_completion_is_forwarded() {
    let (next, settled) = Next::<&str, String>::channel(0);
    assert!(!next.is_called());

    assert!(next.reject("first".to_string()));
    assert!(!next.reject("second".to_string()));
    assert!(!next.resolve_one("late"));
    assert!(next.is_called());

    assert_eq!(block_on(settled).unwrap(), Err("first".to_string()));
  }

  #[test]
  fn clones_share_the_guard() {
    let (next, settled) = Next::<u32, String>::channel(2);
    let other = next.clone();

    assert!(other.resolve(vec![Some(7)]));
    assert!(next.is_called());
    assert!(!next.pass());
    assert_eq!(other.stage_index(), 2);

    assert_eq!(block_on(settled).unwrap(), Ok(vec![Some(7)]));
  }

  #[test]
  fn only_completions_on_the_invoking_thread_count_as_inline() {
    let (next, _settled) = Next::<u32, String>::channel(0);
    next.enter_inline();
    let remote = next.clone();
    std::thread::spawn(move || remote.pass()).join().unwrap();
    assert!(next.is_called());
    assert!(!next.exit_inline());

    let (next, _settled) = Next::<u32, String>::channel(0);
    next.enter_inline();
    next.pass();
    assert!(next.exit_inline());
  }

  #[test]
  fn dropping_every_clone_cancels_the_settlement() {
    let (next, settled) = Next::<u32, String>::channel(0);
    let other = next.clone();
    drop(next);
    drop(other);
    assert!(block_on(settled).is_err());
  }
}
