// sluice/src/pipeline/execution.rs

//! Contains the run loop: `Pipeline::run()` and its callback forms.
//! Each run threads a value vector through the stages and ends in exactly one
//! completion, either the final vector or the first error.

use crate::core::values::{merge_outputs, Values};
use crate::error::SluiceError;
use crate::pipeline::adapter::{PanicPayload, Wrapped};
use crate::pipeline::definition::Pipeline;
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::future::Future;
use std::panic;
use std::sync::Arc;
use tracing::{event, instrument, span, Instrument, Level};

/// A boxed run-level completion, as accepted by [`Pipeline::run_any`].
pub type Completion<V, Err> = Box<dyn FnOnce(Result<Values<V>, Err>) + Send>;

impl<V, Err> Pipeline<V, Err>
where
  V: Clone + Send + 'static,
  Err: std::error::Error + From<SluiceError> + Send + 'static,
{
  /// Runs `values` through every stage in registration order.
  ///
  /// Resolves to the final value vector, or to the first error a stage
  /// produced; no stage after a failing one runs. The returned future owns a
  /// handle to this pipeline and can be spawned.
  ///
  /// Stages are looked up by position as the run reaches them, so stages
  /// registered while the run is in flight are picked up if the run has not
  /// finished yet.
  ///
  /// # Panics
  ///
  /// A calling stage that completes through its `Next` and then panics in the
  /// same call does not stop the run. The remaining stages run and the panic
  /// is resumed once the run has finished.
  pub fn run(&self, values: Values<V>) -> impl Future<Output = Result<Values<V>, Err>> + Send + 'static {
    self.run_with(values, |outcome| outcome)
  }

  /// Callback form of [`Pipeline::run`].
  ///
  /// `done` is called exactly once with the outcome. Whatever it returns is
  /// the output of the returned future, and a panic inside it unwinds to
  /// whoever polls that future; the pipeline does not catch it. A stage panic
  /// held back during the run is resumed after `done` returns.
  pub fn run_with<R, F>(&self, values: Values<V>, done: F) -> impl Future<Output = R> + Send + 'static
  where
    F: FnOnce(Result<Values<V>, Err>) -> R + Send + 'static,
    R: 'static,
  {
    let late_panic = Arc::new(Mutex::new(None));
    let run = self.clone().execute(values, Arc::clone(&late_panic));
    async move {
      let result = done(run.await);
      let payload = late_panic.lock().take();
      if let Some(payload) = payload {
        panic::resume_unwind(payload);
      }
      result
    }
  }

  /// Type-erased callback form of [`Pipeline::run`].
  ///
  /// `completion` must hold a [`Completion<V, Err>`]. If it does not, this
  /// fails with [`SluiceError::NotCallable`] before any stage runs.
  pub fn run_any(
    &self,
    values: Values<V>,
    completion: Box<dyn Any + Send>,
  ) -> Result<impl Future<Output = ()> + Send + 'static, SluiceError> {
    let done = completion.downcast::<Completion<V, Err>>().map_err(|_| {
      let expected = type_name::<Completion<V, Err>>();
      event!(Level::ERROR, %expected, "Run completion is not callable.");
      SluiceError::NotCallable {
        role: "last argument",
        expected,
      }
    })?;
    Ok(self.run_with(values, *done))
  }

  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      input_len = values.len(),
      num_stages = self.len(),
      pipeline_value_type = %std::any::type_name::<V>(),
    ),
    err(Display)
  )]
  async fn execute(self, values: Values<V>, late_panic: Arc<Mutex<Option<PanicPayload>>>) -> Result<Values<V>, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    let input_len = values.len();
    let mut carried = values;
    let mut stage_index = 0;

    while let Some(stage) = self.stage_at(stage_index) {
      let stage_span = span!(
        Level::INFO,
        "pipeline_stage_execution",
        stage_index,
        kind = %stage.kind()
      );

      // The stage body runs synchronously inside `start`.
      let (completion, stage_panic) = stage_span.in_scope(|| Wrapped::at(stage, stage_index).start(carried.clone()));
      if let Some(payload) = stage_panic {
        let mut slot = late_panic.lock();
        if slot.is_none() {
          *slot = Some(payload);
        } else {
          event!(Level::WARN, stage_index, "Another stage panic is already held; dropping this one.");
        }
      }
      let output = match completion.instrument(stage_span).await {
        Ok(output) => output,
        Err(e) => {
          event!(Level::ERROR, stage_index, error = %e, "Stage failed; skipping the remaining stages.");
          return Err(e);
        }
      };

      carried = merge_outputs(input_len, carried, output);
      stage_index += 1;
    }

    event!(Level::DEBUG, stages_run = stage_index, "Pipeline execution completed successfully.");
    Ok(carried)
  }
}
