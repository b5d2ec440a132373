//! Thread-scoped context registry.
//!
//! When a coroutine is switched in, its control block is registered here
//! so code deep inside the body can find "the context running on this
//! thread" without a handle being threaded through every call. Entries
//! are keyed by executor identity and pushed/popped with the call
//! structure; the registry owns nothing and never crosses a thread, so
//! there is nothing to lock.

use std::cell::RefCell;

use crate::coro::Control;
use crate::error::Error;
use crate::exec::ExecutorId;

thread_local! {
  static ACTIVE: RefCell<Vec<(ExecutorId, *const Control)>> = RefCell::new(Vec::new());
}

/// Scoped registration of an active context; dropping it removes the
/// entry.
pub(crate) struct Activation {
  key: ExecutorId,
}

/// Registers `control` as the context running for `key` on this thread.
/// At most one entry per key may be live here at a time.
pub(crate) fn activate(key: ExecutorId, control: *const Control) -> Result<Activation, Error> {
  ACTIVE.with(|stack| {
    let mut stack = stack.borrow_mut();
    if stack.iter().any(|(k, _)| *k == key) {
      return Err(Error::Reentrancy);
    }
    stack.push((key, control));
    Ok(Activation { key })
  })
}

impl Drop for Activation {
  fn drop(&mut self) {
    ACTIVE.with(|stack| match stack.borrow_mut().pop() {
      Some((key, _)) if key == self.key => {}
      _ => debug_assert!(false, "context activations must nest"),
    });
  }
}

/// The innermost active context on this thread, if any.
pub(crate) fn innermost() -> Option<*const Control> {
  ACTIVE.with(|stack| stack.borrow().last().map(|(_, c)| *c))
}

/// The context registered for `key` on this thread, if any.
pub(crate) fn current(key: ExecutorId) -> Option<*const Control> {
  ACTIVE.with(|stack| {
    stack
      .borrow()
      .iter()
      .rev()
      .find(|(k, _)| *k == key)
      .map(|(_, c)| *c)
  })
}

/// True while `key` has an active context on the calling thread.
pub fn is_registered(key: ExecutorId) -> bool {
  current(key).is_some()
}
