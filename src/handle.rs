//! Blocking result handles: the promise/future pair behind `submit`.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::Error;

enum State<T> {
  Pending,
  Ready(Result<T, Error>),
}

struct Shared<T> {
  state: Mutex<State<T>>,
  ready: Condvar,
}

/// The caller's end: blocks for the eventual result.
pub struct ResultHandle<T> {
  shared: Arc<Shared<T>>,
}

/// The producer's end, fulfilled by the completing task. Dropping it
/// unfulfilled fails the handle rather than hanging the caller.
pub struct Promise<T> {
  shared: Arc<Shared<T>>,
  done: bool,
}

impl<T> ResultHandle<T> {
  /// Creates a connected pair.
  pub fn pair() -> (Promise<T>, ResultHandle<T>) {
    let shared = Arc::new(Shared {
      state: Mutex::new(State::Pending),
      ready: Condvar::new(),
    });
    (
      Promise {
        shared: shared.clone(),
        done: false,
      },
      ResultHandle { shared },
    )
  }

  /// Blocks until the task completes, returning its result or the
  /// stored failure.
  pub fn get(self) -> Result<T, Error> {
    let mut state = self.shared.state.lock().unwrap();
    loop {
      match std::mem::replace(&mut *state, State::Pending) {
        State::Ready(result) => return result,
        State::Pending => {
          state = self.shared.ready.wait(state).unwrap();
        }
      }
    }
  }

  /// True once a result (or failure) has been stored.
  pub fn is_finished(&self) -> bool {
    matches!(*self.shared.state.lock().unwrap(), State::Ready(_))
  }
}

impl<T> Promise<T> {
  pub fn fulfill(mut self, value: T) {
    self.store(Ok(value));
  }

  pub fn fail(mut self, error: Error) {
    self.store(Err(error));
  }

  fn store(&mut self, result: Result<T, Error>) {
    self.done = true;
    let mut state = self.shared.state.lock().unwrap();
    *state = State::Ready(result);
    self.shared.ready.notify_all();
  }
}

impl<T> Drop for Promise<T> {
  fn drop(&mut self) {
    if !self.done {
      self.store(Err(Error::Abandoned));
    }
  }
}
