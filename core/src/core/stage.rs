// sluice/src/core/stage.rs

//! Defines the two stage conventions a pipeline accepts and the synchronous
//! return type of returning stages.

use crate::core::next::Next;
use crate::core::values::Values;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Function type of a stage that reports its outcome through its return value.
pub type ReturningFn<V, Err> = Arc<dyn Fn(Values<V>) -> Returned<V, Err> + Send + Sync>;

/// Function type of a stage that reports its outcome through a `Next` continuation.
pub type CallingFn<V, Err> = Arc<dyn Fn(Values<V>, Next<V, Err>) + Send + Sync>;

/// What a returning stage hands back from its synchronous call.
pub enum Returned<V, Err> {
  /// Success with a single output value. `None` means "no value" and leaves
  /// the incoming value in place.
  Value(Option<V>),
  /// Failure; the rest of the pipeline is skipped.
  Error(Err),
  /// The outcome is not known yet. `Ok(value)` becomes the single output once
  /// the future resolves.
  Pending(BoxFuture<'static, Result<Option<V>, Err>>),
}

impl<V, Err> Returned<V, Err> {
  pub fn pending(fut: impl Future<Output = Result<Option<V>, Err>> + Send + 'static) -> Self {
    Returned::Pending(Box::pin(fut))
  }

  pub fn none() -> Self {
    Returned::Value(None)
  }
}

impl<V, Err> From<Option<V>> for Returned<V, Err> {
  fn from(value: Option<V>) -> Self {
    Returned::Value(value)
  }
}

impl<V, Err> From<Result<Option<V>, Err>> for Returned<V, Err> {
  fn from(result: Result<Option<V>, Err>) -> Self {
    match result {
      Ok(value) => Returned::Value(value),
      Err(e) => Returned::Error(e),
    }
  }
}

impl<V, Err> From<()> for Returned<V, Err> {
  fn from(_: ()) -> Self {
    Returned::Value(None)
  }
}

impl<V, Err> fmt::Debug for Returned<V, Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Returned::Value(v) => f.debug_tuple("Value").field(&v.is_some()).finish(),
      Returned::Error(_) => f.write_str("Error"),
      Returned::Pending(_) => f.write_str("Pending"),
    }
  }
}

/// Which completion convention a stage follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
  Returning,
  Calling,
}

impl fmt::Display for StageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageKind::Returning => f.write_str("returning"),
      StageKind::Calling => f.write_str("calling"),
    }
  }
}

/// A unit of work in a pipeline, tagged with the convention it completes by.
///
/// The tag is chosen by the author when the stage is built, via
/// [`Stage::returning`], [`Stage::awaiting`] or [`Stage::calling`].
pub enum Stage<V, Err> {
  /// Called with the incoming values; the return value is the outcome.
  Returning(ReturningFn<V, Err>),
  /// Called with the incoming values and a continuation that must be invoked
  /// (now or later) with the outcome.
  Calling(CallingFn<V, Err>),
}

impl<V, Err> Stage<V, Err>
where
  V: Send + 'static,
  Err: Send + 'static,
{
  /// A stage whose return value (a value, nothing, an error, or a pending
  /// future) is its outcome.
  pub fn returning<R>(f: impl Fn(Values<V>) -> R + Send + Sync + 'static) -> Self
  where
    R: Into<Returned<V, Err>>,
  {
    Stage::Returning(Arc::new(move |values| f(values).into()))
  }

  /// A returning stage written as an async function.
  pub fn awaiting<Fut>(f: impl Fn(Values<V>) -> Fut + Send + Sync + 'static) -> Self
  where
    Fut: Future<Output = Result<Option<V>, Err>> + Send + 'static,
  {
    Stage::Returning(Arc::new(move |values| Returned::pending(f(values))))
  }

  /// A stage that completes by invoking the `Next` continuation it is given.
  pub fn calling(f: impl Fn(Values<V>, Next<V, Err>) + Send + Sync + 'static) -> Self {
    Stage::Calling(Arc::new(f))
  }
}

impl<V, Err> Stage<V, Err> {
  pub fn kind(&self) -> StageKind {
    match self {
      Stage::Returning(_) => StageKind::Returning,
      Stage::Calling(_) => StageKind::Calling,
    }
  }
}

impl<V, Err> Clone for Stage<V, Err> {
  fn clone(&self) -> Self {
    match self {
      Stage::Returning(f) => Stage::Returning(Arc::clone(f)),
      Stage::Calling(f) => Stage::Calling(Arc::clone(f)),
    }
  }
}

impl<V, Err> fmt::Debug for Stage<V, Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Stage").field("kind", &self.kind()).finish()
  }
}
