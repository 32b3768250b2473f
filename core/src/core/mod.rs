pub mod next;
pub mod stage;
pub mod values;

// Re-export key types for easier access from other sluice modules (and lib.rs)
pub use next::Next;
pub use stage::{Returned, Stage, StageKind};
pub use values::{merge_outputs, Values};
