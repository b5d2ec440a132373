//! Everything that can go wrong while building or driving tasks.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
  /// The allocator refused to hand over a stack region.
  #[error("stack allocation failed")]
  OutOfMemory,

  /// Requested stack size is outside the supported range.
  #[error("stack size {requested} outside {min}..={max}")]
  StackBounds { requested: u32, min: u32, max: u32 },

  /// Two adjacent pipeline stages do not line up.
  #[error("stage expects `{expected}` but the previous stage produces `{found}`")]
  TypeMismatch {
    expected: &'static str,
    found: &'static str,
  },

  /// `invoke` was called on a task that already reported `Finished`.
  #[error("task invoked after finish")]
  InvokedAfterFinish,

  /// A context is already registered for this executor on this thread.
  #[error("executor already has an active context on this thread")]
  Reentrancy,

  /// A suspended coroutine was resumed from a foreign thread.
  #[error("coroutine resumed on a thread it does not belong to")]
  CrossThreadResume,

  /// The task body panicked; the payload was caught at the invoke
  /// boundary instead of unwinding across a stack switch.
  #[error("task body panicked: {0}")]
  BodyPanicked(String),

  /// The producing side went away before a result was stored.
  #[error("result abandoned before completion")]
  Abandoned,
}

/// Best-effort rendering of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
