// sluice/examples/basic_pipeline.rs

use sluice::{Next, Pipeline, SluiceError, Stage, Values};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SluiceError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  info!("--- Basic Pipeline Example ---");

  // 1. Create a pipeline threading Strings, failing with SluiceError.
  let pipeline = Pipeline::<String, SluiceError>::new();

  // 2. Register one stage per convention.
  pipeline
    // Returns its outcome synchronously.
    .register_returning(|values: Values<String>| {
      let word = values[0].clone().unwrap_or_default();
      info!("Returning stage saw '{}'", word);
      Some(format!("{}b", word))
    })
    // Returns a future.
    .register(Stage::awaiting(|values: Values<String>| async move {
      tokio::time::sleep(Duration::from_millis(5)).await;
      let word = values[0].clone().unwrap_or_default();
      info!("Awaiting stage saw '{}'", word);
      Ok::<_, SluiceError>(Some(format!("{}c", word)))
    }))
    // Completes through its continuation, from another task.
    .register_calling(|values: Values<String>, next: Next<String, SluiceError>| {
      let word = values[0].clone().unwrap_or_default();
      info!("Calling stage saw '{}'", word);
      tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        next.resolve_one(format!("{}d", word));
      });
    });

  // 3. Run it.
  info!("Starting pipeline execution...");
  let output = pipeline.run(vec![Some("a".to_string())]).await?; // Propagate SluiceError if any

  info!("Final values: {:?}", output);
  assert_eq!(output, vec![Some("abcd".to_string())]);

  // 4. The callback form hands the outcome to a completion instead.
  let len = pipeline
    .run_with(vec![Some("z".to_string())], |outcome| {
      outcome.map(|values| values[0].as_ref().map_or(0, |s| s.len()))
    })
    .await?;
  info!("Second run produced {} characters", len);

  Ok(())
}
