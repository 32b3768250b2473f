// sluice/src/pipeline/definition.rs

//! Contains the `Pipeline<V, Err>` handle and the methods that build up its
//! ordered stage list.

use crate::core::next::Next;
use crate::core::stage::{Returned, Stage};
use crate::core::values::Values;
use crate::error::SluiceError;
use parking_lot::RwLock;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use tracing::{event, Level};

/// An ordered, append-only list of stages that values are threaded through.
///
/// `V` is the type of the values carried between stages; the pipeline never
/// looks inside them. `Err` is the error type stages fail with. It must be
/// `From<SluiceError>` so framework failures (a panicking stage, an abandoned
/// continuation) reach the caller through the same channel.
///
/// `Pipeline` is a handle: clones share one stage list, so a stage registered
/// through any clone is visible to all of them.
pub struct Pipeline<V, Err> {
  pub(crate) stages: Arc<RwLock<Vec<Stage<V, Err>>>>,
}

/// Creates an empty pipeline.
pub fn create_pipeline<V, Err>() -> Pipeline<V, Err>
where
  V: Clone + Send + 'static,
  Err: std::error::Error + From<SluiceError> + Send + 'static,
{
  Pipeline::new()
}

impl<V, Err> Pipeline<V, Err>
where
  V: Clone + Send + 'static,
  Err: std::error::Error + From<SluiceError> + Send + 'static,
{
  pub fn new() -> Self {
    Self {
      stages: Arc::new(RwLock::new(Vec::new())),
    }
  }

  /// Appends `stage` and returns this pipeline, so registrations chain.
  pub fn register(&self, stage: Stage<V, Err>) -> &Self {
    let kind = stage.kind();
    let mut stages = self.stages.write();
    stages.push(stage);
    event!(Level::DEBUG, stage_index = stages.len() - 1, %kind, "Stage registered.");
    self
  }

  /// Registers a stage whose return value is its outcome.
  /// See [`Stage::returning`].
  pub fn register_returning<R>(&self, f: impl Fn(Values<V>) -> R + Send + Sync + 'static) -> &Self
  where
    R: Into<Returned<V, Err>>,
  {
    self.register(Stage::returning(f))
  }

  /// Registers a stage that completes through the `Next` continuation it is given.
  /// See [`Stage::calling`].
  pub fn register_calling(&self, f: impl Fn(Values<V>, Next<V, Err>) + Send + Sync + 'static) -> &Self {
    self.register(Stage::calling(f))
  }

  /// Registers a stage handed over as a type-erased value.
  ///
  /// Fails with [`SluiceError::NotCallable`] and leaves the pipeline untouched
  /// if `stage` does not hold a `Stage<V, Err>`.
  pub fn register_any(&self, stage: Box<dyn Any + Send>) -> Result<&Self, SluiceError> {
    match stage.downcast::<Stage<V, Err>>() {
      Ok(stage) => Ok(self.register(*stage)),
      Err(_) => {
        let expected = type_name::<Stage<V, Err>>();
        event!(Level::ERROR, %expected, "Refusing to register a value that is not a stage.");
        Err(SluiceError::NotCallable { role: "stage", expected })
      }
    }
  }

  /// Number of stages registered so far.
  pub fn len(&self) -> usize {
    self.stages.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.stages.read().is_empty()
  }

  /// Whether `self` and `other` are handles to the same stage list.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.stages, &other.stages)
  }

  /// The stage at `stage_index`, read from the live list.
  pub(crate) fn stage_at(&self, stage_index: usize) -> Option<Stage<V, Err>> {
    self.stages.read().get(stage_index).cloned()
  }
}

impl<V, Err> Clone for Pipeline<V, Err> {
  fn clone(&self) -> Self {
    Self {
      stages: Arc::clone(&self.stages),
    }
  }
}

impl<V, Err> Default for Pipeline<V, Err>
where
  V: Clone + Send + 'static,
  Err: std::error::Error + From<SluiceError> + Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<V, Err> fmt::Debug for Pipeline<V, Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("stages", &self.stages.read().len())
      .finish()
  }
}
