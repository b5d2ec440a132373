//! The dispatch façade: build the invocation, wrap it in a task, hand it
//! over.

use log::trace;

use crate::coro::CoroTask;
use crate::error::Error;
use crate::exec::{Executor, ThreadExecutor};
use crate::handle::{Promise, ResultHandle};
use crate::invoke::{Callable, Invocation, Invoke};
use crate::task::PlainTask;

/// Fire and forget: schedules `func` bound with `args` on `ex`. No
/// feedback, by design.
pub fn post<E, F, A>(ex: &E, func: F, args: A)
where
  E: Executor + ?Sized,
  F: Callable<A> + Send + 'static,
  A: Clone + Send + 'static,
{
  trace!("post to {:?}", ex.id());
  ex.schedule(Box::new(PlainTask::new(Invocation::bind(func, args))));
}

/// Schedules an already-built invocation — a chain, a pipeline.
pub fn post_invoke<E, I>(ex: &E, inv: I)
where
  E: Executor + ?Sized,
  I: Invoke + Send + 'static,
{
  trace!("post invocation to {:?}", ex.id());
  ex.schedule(Box::new(PlainTask::new(inv)));
}

/// Schedules `func` bound with `args` and returns a handle to its
/// eventual result.
pub fn submit<E, F, A>(ex: &E, func: F, args: A) -> ResultHandle<F::Output>
where
  E: Executor + ?Sized,
  F: Callable<A> + Send + 'static,
  A: Clone + Send + 'static,
  F::Output: Send + 'static,
{
  trace!("submit to {:?}", ex.id());
  let (promise, handle) = ResultHandle::pair();
  ex.schedule(Box::new(PlainTask::new(completing(
    Invocation::bind(func, args),
    promise,
  ))));
  handle
}

/// `submit` without an executor: runs on a single-use worker thread that
/// drains its queue and exits by itself.
pub fn submit_detached<F, A>(func: F, args: A) -> ResultHandle<F::Output>
where
  F: Callable<A> + Send + 'static,
  A: Clone + Send + 'static,
  F::Output: Send + 'static,
{
  let ex = ThreadExecutor::new();
  let handle = submit(&ex, func, args);
  ex.detach();
  handle
}

/// Schedules on `ex` and blocks for the result.
pub fn sync_via<E, F, A>(ex: &E, func: F, args: A) -> Result<F::Output, Error>
where
  E: Executor + ?Sized,
  F: Callable<A> + Send + 'static,
  A: Clone + Send + 'static,
  F::Output: Send + 'static,
{
  submit(ex, func, args).get()
}

/// The run-inline fallback: no task, no scheduling, no stack switch.
/// Exactly equivalent to calling `func` with `args` yourself.
pub fn sync<F, A>(mut func: F, args: A) -> F::Output
where
  F: Callable<A>,
{
  func.call(args)
}

/// Schedules a coroutine-backed task: the body may call
/// [`crate::this_task::yield_now`] and is re-invoked until it finishes.
pub fn post_coro<E, F, A>(ex: &E, stack_size: u32, func: F, args: A) -> Result<(), Error>
where
  E: Executor + ?Sized,
  F: Callable<A> + Send + 'static,
  A: Clone + Send + 'static,
{
  let task = CoroTask::with_stack_size(Invocation::bind(func, args), stack_size)?.keyed(ex.id());
  ex.schedule(Box::new(task));
  Ok(())
}

/// Coroutine `submit`: returns a handle to the body's result.
pub fn submit_coro<E, F, A>(
  ex: &E,
  stack_size: u32,
  func: F,
  args: A,
) -> Result<ResultHandle<F::Output>, Error>
where
  E: Executor + ?Sized,
  F: Callable<A> + Send + 'static,
  A: Clone + Send + 'static,
  F::Output: Send + 'static,
{
  let (promise, handle) = ResultHandle::pair();
  let task = CoroTask::with_stack_size(
    completing(Invocation::bind(func, args), promise),
    stack_size,
  )?
  .keyed(ex.id());
  ex.schedule(Box::new(task));
  Ok(handle)
}

/// Wraps an invocation so completing it fulfills `promise`.
fn completing<I>(mut inv: I, promise: Promise<I::Output>) -> impl Invoke<Output = ()>
where
  I: Invoke,
{
  let mut promise = Some(promise);
  Invocation::new(move || {
    let value = inv.invoke();
    if let Some(p) = promise.take() {
      p.fulfill(value);
    }
  })
}
