// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use sluice::{Next, Pipeline, Returned, SluiceError, Stage, Values};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)] // Clone, PartialEq, Eq for assertions
pub enum TestError {
  #[error("Sluice framework error: {0}")]
  Sluice(String), // Store as String for Eq comparison

  #[error("{0}")]
  Stage(String),
}

impl From<SluiceError> for TestError {
  fn from(se: SluiceError) -> Self {
    TestError::Sluice(format!("{:?}", se))
  }
}

pub type TestPipeline = Pipeline<String, TestError>;

pub fn values(items: &[&str]) -> Values<String> {
  items.iter().map(|s| Some(s.to_string())).collect()
}

fn first(values: &Values<String>) -> String {
  values.first().cloned().flatten().unwrap_or_default()
}

// --- Common Stage Creators ---

/// Synchronously returns the first value with `suffix` appended.
pub fn append_stage(suffix: &'static str) -> Stage<String, TestError> {
  Stage::returning(move |values: Values<String>| Some(format!("{}{}", first(&values), suffix)))
}

/// Returns a pending future that appends `suffix` after yielding once.
pub fn promise_append_stage(suffix: &'static str) -> Stage<String, TestError> {
  Stage::awaiting(move |values: Values<String>| async move {
    tokio::task::yield_now().await;
    Ok::<_, TestError>(Some(format!("{}{}", first(&values), suffix)))
  })
}

/// Calls its continuation from a spawned task, after a short sleep.
pub fn deferred_append_stage(suffix: &'static str) -> Stage<String, TestError> {
  Stage::calling(move |values: Values<String>, next: Next<String, TestError>| {
    let value = format!("{}{}", first(&values), suffix);
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(1)).await;
      next.resolve_one(value);
    });
  })
}

/// Returns an error with `message`.
pub fn failing_stage(message: &'static str) -> Stage<String, TestError> {
  Stage::returning(move |_values: Values<String>| Returned::Error(TestError::Stage(message.to_string())))
}

/// Counts its invocations and passes the values on unchanged.
pub fn counting_stage(counter: Arc<AtomicUsize>) -> Stage<String, TestError> {
  Stage::returning(move |_values: Values<String>| {
    counter.fetch_add(1, Ordering::SeqCst);
  })
}

pub fn new_counter() -> Arc<AtomicUsize> {
  Arc::new(AtomicUsize::new(0))
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  // RUST_LOG overrides the default of tracing everything.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
