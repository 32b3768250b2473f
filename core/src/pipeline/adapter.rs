// sluice/src/pipeline/adapter.rs

//! The stage adapter: normalizes returning, future-returning and
//! continuation-calling stages into one completion that fires exactly once.

use crate::core::next::{Next, Settlement};
use crate::core::stage::{Returned, Stage};
use crate::core::values::Values;
use crate::error::SluiceError;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::{event, Level};

/// Payload of a panic caught around a stage body.
pub(crate) type PanicPayload = Box<dyn Any + Send>;

/// A stage bound to its position, ready to be invoked once.
///
/// Obtained from [`wrap`]; the pipeline builds one per stage boundary it crosses.
pub struct Wrapped<V, Err> {
  stage: Stage<V, Err>,
  stage_index: usize,
}

/// Wraps `stage` so that however it completes (returned value, returned
/// error, pending future, `Next` call, or panic) the caller observes a single
/// `Result`.
pub fn wrap<V, Err>(stage: Stage<V, Err>) -> Wrapped<V, Err> {
  Wrapped::at(stage, 0)
}

impl<V, Err> Wrapped<V, Err> {
  pub(crate) fn at(stage: Stage<V, Err>, stage_index: usize) -> Self {
    Self { stage, stage_index }
  }
}

impl<V, Err> Wrapped<V, Err>
where
  V: Send + 'static,
  Err: From<SluiceError> + Send + 'static,
{
  /// Invokes the stage with `values` and returns its completion.
  ///
  /// The stage itself runs synchronously inside this call; only waiting for
  /// its outcome is deferred to the returned future.
  ///
  /// # Panics
  ///
  /// Resumes the stage's panic if a calling stage panicked after it had
  /// already completed through its `Next` within the same call. Use
  /// [`Wrapped::invoke_with`] to have the delivered outcome handled first.
  pub fn invoke(self, values: Values<V>) -> BoxFuture<'static, Result<Values<V>, Err>> {
    let (completion, late_panic) = self.start(values);
    if let Some(payload) = late_panic {
      panic::resume_unwind(payload);
    }
    completion
  }

  /// Callback form of [`Wrapped::invoke`]: `callback` receives the completion
  /// exactly once and its return value is the output of the returned future.
  ///
  /// A panic raised by the stage after it completed is resumed once
  /// `callback` has returned.
  pub fn invoke_with<R, F>(self, values: Values<V>, callback: F) -> impl Future<Output = R> + Send + 'static
  where
    F: FnOnce(Result<Values<V>, Err>) -> R + Send + 'static,
    R: 'static,
  {
    let (completion, late_panic) = self.start(values);
    async move {
      let result = callback(completion.await);
      if let Some(payload) = late_panic {
        panic::resume_unwind(payload);
      }
      result
    }
  }

  /// Runs the stage body and returns its completion, plus the payload of a
  /// panic the stage raised after completing inline. The caller decides when
  /// that panic resurfaces.
  pub(crate) fn start(self, values: Values<V>) -> (BoxFuture<'static, Result<Values<V>, Err>>, Option<PanicPayload>) {
    let stage_index = self.stage_index;
    let (next, settled) = Next::channel(stage_index);

    match self.stage {
      Stage::Calling(f) => {
        let handle = next.clone();
        next.enter_inline();
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(values, handle)));
        let completed_inline = next.exit_inline();

        let mut late_panic = None;
        if let Err(payload) = result {
          if completed_inline {
            event!(Level::ERROR, stage_index, "Stage panicked after completing; the panic resurfaces after the run.");
            late_panic = Some(payload);
          } else if !next.reject(SluiceError::from_panic(stage_index, payload.as_ref())) {
            event!(Level::WARN, stage_index, "Calling stage panicked after completing on another thread; panic dropped.");
          } else {
            event!(Level::WARN, stage_index, "Calling stage panicked before completing.");
          }
        }
        // Our own handle must go, or an abandoned stage would never settle.
        drop(next);
        (settle(stage_index, settled).boxed(), late_panic)
      }
      Stage::Returning(f) => {
        let returned = match panic::catch_unwind(AssertUnwindSafe(|| f(values))) {
          Ok(returned) => returned,
          Err(payload) => {
            event!(Level::WARN, stage_index, "Returning stage panicked.");
            Returned::Error(Err::from(SluiceError::from_panic(stage_index, payload.as_ref())))
          }
        };

        match returned {
          Returned::Value(value) => {
            next.resolve(vec![value]);
            (settle(stage_index, settled).boxed(), None)
          }
          Returned::Error(e) => {
            next.reject(e);
            (settle(stage_index, settled).boxed(), None)
          }
          Returned::Pending(fut) => (
            async move {
              event!(Level::TRACE, stage_index, "Awaiting pending stage outcome.");
              let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(value)) => Ok(vec![value]),
                Ok(Err(e)) => Err(e),
                Err(payload) => {
                  event!(Level::WARN, stage_index, "Pending stage outcome panicked.");
                  Err(Err::from(SluiceError::from_panic(stage_index, payload.as_ref())))
                }
              };
              next.call(outcome);
              drop(next);
              settle(stage_index, settled).await
            }
            .boxed(),
            None,
          ),
        }
      }
    }
  }
}

async fn settle<V, Err>(stage_index: usize, settled: Settlement<V, Err>) -> Result<Values<V>, Err>
where
  Err: From<SluiceError>,
{
  match settled.await {
    Ok(outcome) => outcome,
    Err(_canceled) => {
      event!(Level::WARN, stage_index, "Stage dropped its continuation without completing.");
      Err(Err::from(SluiceError::Abandoned { stage_index }))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::executor::block_on;

  type TestResult = Result<Values<&'static str>, SluiceError>;

  #[test]
  fn returned_value_becomes_single_output() {
    let stage = Stage::<&str, SluiceError>::returning(|_| Some("out"));
    let outcome: TestResult = block_on(wrap(stage).invoke(vec![Some("in"), Some("rest")]));
    assert_eq!(outcome.unwrap(), vec![Some("out")]);
  }

  #[test]
  fn returned_nothing_is_success_without_value() {
    let stage = Stage::<&str, SluiceError>::returning(|_| ());
    let outcome: TestResult = block_on(wrap(stage).invoke(vec![Some("in")]));
    assert_eq!(outcome.unwrap(), vec![None]);
  }

  #[test]
  fn calling_stage_runs_inside_invoke() {
    let stage = Stage::<&str, SluiceError>::calling(|values, next| {
      next.resolve(values);
    });
    let pending = wrap(stage).invoke(vec![Some("kept")]);
    assert_eq!(block_on(pending).unwrap(), vec![Some("kept")]);
  }

  #[test]
  fn dropped_continuation_is_reported_as_abandoned() {
    let stage = Stage::<&str, SluiceError>::calling(|_, next| drop(next));
    let outcome: TestResult = block_on(Wrapped::at(stage, 4).invoke(Vec::new()));
    assert!(matches!(outcome, Err(SluiceError::Abandoned { stage_index: 4 })));
  }

  #[test]
  fn panic_in_pending_future_is_a_failure() {
    let stage = Stage::<&str, SluiceError>::awaiting(|_| async {
      if true {
        panic!("late");
      }
      Ok(None)
    });
    let outcome: TestResult = block_on(wrap(stage).invoke(Vec::new()));
    match outcome {
      Err(SluiceError::StagePanicked { message, .. }) => assert_eq!(message, "late"),
      other => panic!("Expected StagePanicked, got {:?}", other),
    }
  }

  #[test]
  fn invoke_with_hands_the_completion_to_the_callback() {
    let stage = Stage::<&str, SluiceError>::returning(|_| Returned::Error(SluiceError::Abandoned { stage_index: 9 }));
    let seen = block_on(wrap(stage).invoke_with(Vec::new(), |outcome| outcome.unwrap_err().to_string()));
    assert_eq!(seen, "Stage 9 dropped its continuation without completing");
  }

  #[test]
  fn panic_after_inline_completion_resurfaces_after_the_callback() {
    let stage = Stage::<&str, SluiceError>::calling(|values, next| {
      next.resolve(values);
      panic!("after");
    });
    let delivered = std::sync::Arc::new(parking_lot::Mutex::new(None));
    let sink = delivered.clone();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
      block_on(wrap(stage).invoke_with(vec![Some("kept")], move |outcome| {
        *sink.lock() = Some(outcome.unwrap());
      }))
    }));

    assert_eq!(*caught.unwrap_err().downcast::<&str>().unwrap(), "after");
    assert_eq!(*delivered.lock(), Some(vec![Some("kept")]));
  }

  #[test]
  fn panic_after_completion_on_another_thread_is_not_resumed() {
    let stage = Stage::<&str, SluiceError>::calling(|values, next| {
      std::thread::spawn(move || next.resolve(values)).join().unwrap();
      panic!("after remote completion");
    });
    let (completion, late_panic) = wrap(stage).start(vec![Some("kept")]);

    assert!(late_panic.is_none());
    assert_eq!(block_on(completion).unwrap(), vec![Some("kept")]);
  }
}
