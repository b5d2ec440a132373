//! Coroutine tasks: ordinary function bodies that can suspend.
//!
//! A [`CoroTask`] owns a dedicated stack and runs its invocation there.
//! `invoke` switches in; the body runs until it calls
//! [`this_task::yield_now`] or returns, and control comes back with a
//! [`TaskStatus`]. The context is linked lazily on the first invoke,
//! which pins the task to that thread for the rest of its life.

use std::any::Any;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use log::{trace, warn};

use crate::error::{panic_message, Error};
use crate::exec::ExecutorId;
use crate::invoke::Invoke;
use crate::registry;
use crate::stack::{HeapStack, Stack, DEFAULT_STACK_SIZE};
use crate::switch::{link_closure, swap};
use crate::task::{Task, TaskStatus};

/// Raised at a yield point when the task has been cancelled. A private
/// payload type, so it can never be confused with a user panic.
struct CancelUnwind;

/// State shared between a `CoroTask` and its running body. Boxed so the
/// address stays put while both sides poke at it.
pub(crate) struct Control {
  /// Paused stack of whoever performed the last switch-in. Only valid
  /// while the coroutine is somewhere on this thread's call path.
  caller: Cell<*mut usize>,
  /// True from body entry until the body returns.
  running: Cell<bool>,
  /// Cooperative cancellation request.
  cancelled: AtomicBool,
  /// Panic payload, carried over the switch boundary by value rather
  /// than by unwinding.
  panic: Cell<Option<Box<dyn Any + Send>>>,
}

impl Control {
  fn new() -> Control {
    Control {
      caller: Cell::new(std::ptr::null_mut()),
      running: Cell::new(false),
      cancelled: AtomicBool::new(false),
      panic: Cell::new(None),
    }
  }

  pub(crate) fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  pub(crate) fn cancel_requested(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }

  /// Switches from the coroutine side back to the invoker; returns once
  /// somebody invokes the task again.
  ///
  /// # Safety
  ///
  /// Must be called on the coroutine's own stack, with `caller` holding
  /// the invoker's paused context.
  pub(crate) unsafe fn switch_out(&self) {
    let sw = swap(self.caller.get(), 0);
    self.caller.set(sw.stack);
    // Resumed. A pending cancellation unwinds the body from here, unless
    // an unwind is already in flight (a destructor yielded; let it run).
    if self.cancel_requested() && !thread::panicking() {
      std::panic::panic_any(CancelUnwind);
    }
  }
}

/// A [`Task`] that runs its invocation on its own stack and may suspend
/// any number of times before finishing.
pub struct CoroTask<I: Invoke, S: Stack = HeapStack> {
  stack: S,
  control: Box<Control>,
  /// Body invocation; present until the context is linked.
  inv: Option<I>,
  /// The coroutine's paused context; null until linked.
  resume_at: *mut usize,
  /// Thread the context was linked on; the task belongs to it afterwards.
  home: Option<ThreadId>,
  finished: bool,
  key: ExecutorId,
}

impl<I: Invoke> CoroTask<I, HeapStack> {
  /// Builds a coroutine task with the default stack size.
  pub fn new(inv: I) -> Result<Self, Error> {
    Self::with_stack_size(inv, DEFAULT_STACK_SIZE)
  }

  /// Builds a coroutine task with `size` bytes of stack. Fails before
  /// any context exists when the size is out of bounds or the allocation
  /// is refused.
  pub fn with_stack_size(inv: I, size: u32) -> Result<Self, Error> {
    Ok(Self::on_stack(inv, HeapStack::new(size)?))
  }
}

impl<I: Invoke, S: Stack> CoroTask<I, S> {
  /// Builds a coroutine task on a caller-provided stack.
  pub fn on_stack(inv: I, stack: S) -> Self {
    CoroTask {
      stack,
      control: Box::new(Control::new()),
      inv: Some(inv),
      resume_at: std::ptr::null_mut(),
      home: None,
      finished: false,
      key: ExecutorId::fresh(),
    }
  }

  /// Registers the task under `key` instead of its own fresh identity,
  /// so bodies scheduled by an executor resolve to it in the registry.
  pub fn keyed(mut self, key: ExecutorId) -> Self {
    self.key = key;
    self
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  /// Links the execution context: moves the body onto the coroutine
  /// stack, parked just before its first instruction.
  fn link(&mut self) {
    let control: *const Control = &*self.control;
    let inv = self.inv.take().expect("linked exactly once");
    let body = move |caller: *mut usize, _arg: usize| {
      // SAFETY: the control block outlives the coroutine; the task's
      // drop glue resumes or abandons this context before freeing it.
      let ctl = unsafe { &*control };
      ctl.caller.set(caller);
      if ctl.cancel_requested() {
        trace!("cancelled before start, body skipped");
        drop(inv);
      } else {
        ctl.running.set(true);
        let outcome = catch_unwind(AssertUnwindSafe(move || {
          let mut inv = inv;
          inv.invoke();
        }));
        ctl.running.set(false);
        match outcome {
          Ok(()) => {}
          Err(payload) if payload.is::<CancelUnwind>() => {
            trace!("body unwound at a cancellation point");
          }
          Err(payload) => ctl.panic.set(Some(payload)),
        }
      }
      // Park the context in its terminal state and leave for good; the
      // finished flag on the task side keeps everyone from coming back.
      unsafe {
        swap(ctl.caller.get(), 0);
      }
      unreachable!("finished coroutine resumed");
    };
    // SAFETY: the stack is aligned and bounds-checked at construction;
    // the closure never returns and catches every unwind.
    self.resume_at = unsafe { link_closure(self.stack.end(), body) };
    self.home = Some(thread::current().id());
  }
}

impl<I: Invoke, S: Stack> Task for CoroTask<I, S> {
  fn invoke(&mut self) -> Result<TaskStatus, Error> {
    if self.finished {
      return Err(Error::InvokedAfterFinish);
    }
    match self.home {
      None => self.link(),
      Some(home) if home != thread::current().id() => return Err(Error::CrossThreadResume),
      Some(_) => {}
    }
    let _active = registry::activate(self.key, &*self.control)?;
    // SAFETY: resume_at is the context parked by link or by the last
    // yield; the finished and home guards above keep it unique and
    // local.
    let sw = unsafe { swap(self.resume_at, 0) };
    self.resume_at = sw.stack;
    if self.control.running.get() {
      Ok(TaskStatus::Repeat)
    } else {
      self.finished = true;
      match self.control.panic.take() {
        Some(payload) => Err(Error::BodyPanicked(panic_message(payload.as_ref()))),
        None => Ok(TaskStatus::Finished),
      }
    }
  }

  fn yield_now(&mut self) {
    // Only meaningful from within the body's dynamic extent, where the
    // free-function form is the natural call; anywhere else this is a
    // no-op because the caller cell would be stale.
    let me: *const Control = &*self.control;
    if registry::innermost() == Some(me) {
      unsafe { self.control.switch_out() }
    }
  }

  fn cancel(&mut self) {
    self.control.cancel();
  }
}

impl<I: Invoke, S: Stack> Drop for CoroTask<I, S> {
  fn drop(&mut self) {
    if self.finished || self.home.is_none() {
      // Nothing lives on the coroutine stack yet, or not any more.
      return;
    }
    if self.home != Some(thread::current().id()) {
      // Resuming from here would migrate the context. Abandon the stack
      // instead: values parked on it are leaked, never double-freed.
      warn!("live coroutine task dropped off-thread; stack abandoned");
      return;
    }
    // Cancel and drive the body until it has unwound, so destructors on
    // the coroutine stack run.
    self.control.cancel();
    while !self.finished {
      match self.invoke() {
        Ok(TaskStatus::Repeat) => continue,
        Ok(TaskStatus::Finished) => break,
        Err(_) => break, // captured panic or a parked context; both final
      }
    }
  }
}

// An unstarted coroutine is just data; once linked it is pinned to its
// home thread by the checks in invoke and drop. The raw pointers inside
// are only ever followed on that thread.
unsafe impl<I, S> Send for CoroTask<I, S>
where
  I: Invoke + Send,
  S: Stack + Send,
{
}

/// Free functions for code running inside a coroutine body.
pub mod this_task {
  use crate::registry;

  /// Suspends the innermost coroutine active on this thread, handing
  /// control back to whoever invoked it. Returns `true` once resumed,
  /// or `false` immediately when no coroutine is active (plain tasks
  /// and bare callers just keep going).
  pub fn yield_now() -> bool {
    match registry::innermost() {
      Some(control) => {
        // SAFETY: innermost() only ever holds a context this thread is
        // currently executing; we are on its stack.
        unsafe { (*control).switch_out() };
        true
      }
      None => false,
    }
  }

  /// True when the innermost active coroutine has been asked to cancel.
  /// Bodies with long stretches between yields can poll this and bail
  /// out early.
  pub fn cancel_requested() -> bool {
    match registry::innermost() {
      // SAFETY: same as yield_now.
      Some(control) => unsafe { (*control).cancel_requested() },
      None => false,
    }
  }
}
