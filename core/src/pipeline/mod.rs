// sluice/src/pipeline/mod.rs

//! Defines the `Pipeline<V, Err>` handle, the stage adapter, and the run loop.

pub mod adapter;
pub mod definition;
pub mod execution;

// Re-export the main Pipeline struct
pub use adapter::{wrap, Wrapped};
pub use definition::{create_pipeline, Pipeline};
pub use execution::Completion;
