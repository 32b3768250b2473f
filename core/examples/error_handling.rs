// sluice/examples/error_handling.rs

use sluice::{Next, Pipeline, Returned, SluiceError, Values};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// 1. Define a custom application error type
#[derive(Debug, thiserror::Error)]
enum ExampleAppError {
  #[error("A custom application error occurred: {0}")]
  CustomError(String),

  #[error("Sluice framework error during pipeline execution: {0}")]
  SluiceFramework(#[from] SluiceError), // Allows SluiceError to be converted into ExampleAppError
}

type AppPipeline = Pipeline<u32, ExampleAppError>;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
  info!("--- Error Handling Example ---");

  // Scenario 1: A stage returns an error; later stages never run.
  info!("\nScenario 1: Stage returns a custom error");
  let pipeline = AppPipeline::new();
  pipeline
    .register_returning(|values: Values<u32>| -> Returned<u32, ExampleAppError> {
      match values[0] {
        Some(n) if n % 2 == 1 => Returned::Error(ExampleAppError::CustomError(format!("{} is odd", n))),
        other => Returned::Value(other.map(|n| n / 2)),
      }
    })
    .register_returning(|_values: Values<u32>| {
      error!("This stage should not run after a failure");
    });
  report(pipeline.run(vec![Some(7)]).await);

  // Scenario 2: A stage panics before completing; the panic becomes an error.
  info!("\nScenario 2: Stage panics before completing");
  let pipeline = AppPipeline::new();
  pipeline.register_calling(|_values: Values<u32>, _next: Next<u32, ExampleAppError>| {
    panic!("sensor offline");
  });
  report(pipeline.run(vec![Some(1)]).await);

  // Scenario 3: A stage drops its continuation.
  info!("\nScenario 3: Stage abandons its continuation");
  let pipeline = AppPipeline::new();
  pipeline.register_calling(|_values: Values<u32>, next: Next<u32, ExampleAppError>| drop(next));
  report(pipeline.run(Vec::new()).await);
}

fn report(outcome: Result<Values<u32>, ExampleAppError>) {
  match outcome {
    Ok(values) => info!("Pipeline succeeded with {:?}", values),
    Err(ExampleAppError::CustomError(msg)) => error!("Stage failed: {}", msg),
    Err(ExampleAppError::SluiceFramework(e)) => error!("Framework error: {}", e),
  }
}
