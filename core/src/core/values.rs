// sluice/src/core/values.rs

//! The value vector threaded between stages and the positional merge applied
//! at every stage boundary.

/// The ordered values passed from one stage to the next.
///
/// `None` marks an absent slot. A stage that leaves a slot absent keeps the
/// value its predecessor carried at that position.
pub type Values<V> = Vec<Option<V>>;

/// Computes the effective vector a stage hands to its successor.
///
/// For every position below `input_len` (the length of the vector the run
/// started with), an absent `output` slot is filled from `carried`, the
/// previous effective vector. Positions past `input_len` are taken from
/// `output` as is, so a stage may return more values than it received.
pub fn merge_outputs<V>(input_len: usize, carried: Values<V>, mut output: Values<V>) -> Values<V> {
  if output.len() < input_len {
    output.resize_with(input_len, || None);
  }

  for (slot, previous) in output.iter_mut().zip(carried).take(input_len) {
    if slot.is_none() {
      *slot = previous;
    }
  }

  output
}
