// src/lib.rs

//! Sluice: a sequential middleware pipeline for Rust.
//!
//! A pipeline is an ordered list of stages. Running it threads a vector of
//! values through every stage in turn and ends in exactly one outcome: the
//! final vector, or the first error.
//!
//! Stages follow one of two explicitly tagged conventions:
//!  - Returning stages hand back a value, nothing, an error, or a pending
//!    future ([`Stage::returning`], [`Stage::awaiting`]).
//!  - Calling stages receive a [`Next`] continuation and complete by calling
//!    it, now or later ([`Stage::calling`]).
//!
//! Whatever the convention, a stage completes exactly once. Repeated
//! completions are dropped, panics become errors, and a slot a stage leaves
//! empty keeps the value its predecessor carried.

pub mod core;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

pub use crate::core::next::Next;
pub use crate::core::stage::{Returned, Stage, StageKind};
pub use crate::core::values::{merge_outputs, Values};

pub use crate::pipeline::adapter::{wrap, Wrapped};
pub use crate::pipeline::definition::{create_pipeline, Pipeline};
pub use crate::pipeline::execution::Completion;

pub use crate::error::{SluiceError, SluiceResult};

/*
    Core Workflow:
    1. Pick the value type `V` your stages exchange and an error type `Err`
       that is `From<SluiceError>` (or use `SluiceError` itself).
    2. Create a `Pipeline<V, Err>` and register stages with
       `.register_returning()`, `.register_calling()` or `.register(Stage::awaiting(..))`.
    3. Call `pipeline.run(vec![Some(input)]).await` for the final values, or
       `pipeline.run_with(values, |outcome| ..)` to hand the outcome to a callback.
*/
