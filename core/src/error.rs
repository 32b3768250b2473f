// sluice/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SluiceError {
  /// A type-erased value handed to `register_any` or `run_any` was not the
  /// callable the pipeline expected.
  #[error("Expected {expected} as {role}, not a value of another type")]
  NotCallable { role: &'static str, expected: &'static str },

  #[error("Stage {stage_index} panicked: {message}")]
  StagePanicked { stage_index: usize, message: String },

  #[error("Stage {stage_index} dropped its continuation without completing")]
  Abandoned { stage_index: usize },

  #[error("Error in user-provided stage. Source: {source}")]
  StageFailed {
    #[source]
    source: AnyhowError,
  },
}

impl SluiceError {
  /// Turns a panic payload caught around a stage into a `StagePanicked` error.
  pub(crate) fn from_panic(stage_index: usize, payload: &(dyn std::any::Any + Send)) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_string()
    };
    SluiceError::StagePanicked { stage_index, message }
  }
}

impl From<AnyhowError> for SluiceError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap a SluiceError that was boxed into anyhow on its way through a stage.
    match err.downcast::<SluiceError>() {
      Ok(sluice_err) => sluice_err,
      Err(source) => SluiceError::StageFailed { source },
    }
  }
}

pub type SluiceResult<T, E = SluiceError> = std::result::Result<T, E>;
