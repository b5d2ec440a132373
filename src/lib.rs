//! Cooperative task dispatch with stackful coroutines.
//!
//! Callables and their captured arguments become [`Invocation`]s,
//! invocations compose into chains, chains become [`Task`]s, and tasks go
//! to an [`Executor`]. A long-running body can be given a stack of its own
//! with [`CoroTask`]: it suspends with [`this_task::yield_now`] and picks
//! up exactly where it left off on the next `invoke`, without ever
//! unwinding.

pub mod coro;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod handle;
pub mod invoke;
pub mod registry;
pub mod stack;
pub mod switch;
pub mod task;

pub use coro::{this_task, CoroTask};
pub use dispatch::{
  post, post_coro, post_invoke, submit, submit_coro, submit_detached, sync, sync_via,
};
pub use error::Error;
pub use exec::{Executor, ExecutorId, ThreadExecutor};
pub use handle::{Promise, ResultHandle};
pub use invoke::{Callable, Invocation, Invoke, InvokeExt, Pipeline};
pub use stack::{HeapStack, Stack, DEFAULT_STACK_SIZE, MAX_STACK_SIZE, MIN_STACK_SIZE};
pub use task::{PlainTask, Task, TaskStatus};
