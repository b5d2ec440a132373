//! Executors: whoever actually calls `invoke`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, error, trace};

use crate::task::{Task, TaskStatus};

/// Identity an executor registers contexts under. A small value, not a
/// pointer, so a stale registry lookup can never dangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutorId(u64);

impl ExecutorId {
  /// Hands out a process-unique identity.
  pub fn fresh() -> ExecutorId {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    ExecutorId(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

/// The scheduling contract the dispatch layer consumes. May be
/// re-entered from within its own running tasks.
pub trait Executor {
  fn schedule(&self, task: Box<dyn Task + Send>);

  fn id(&self) -> ExecutorId;
}

/// One worker thread draining an injection channel into a local run
/// queue. A task that reports `Repeat` goes to the back of the queue, so
/// yielding tasks take turns.
pub struct ThreadExecutor {
  tx: Option<Sender<Box<dyn Task + Send>>>,
  worker: Option<JoinHandle<()>>,
  id: ExecutorId,
}

impl ThreadExecutor {
  pub fn new() -> ThreadExecutor {
    let id = ExecutorId::fresh();
    let (tx, rx) = channel();
    let worker = thread::Builder::new()
      .name(format!("cotask-worker-{}", id.0))
      .spawn(move || worker_loop(rx))
      .expect("failed to spawn executor worker");
    ThreadExecutor {
      tx: Some(tx),
      worker: Some(worker),
      id,
    }
  }

  /// Lets the worker go: it drains whatever is queued and exits on its
  /// own, with nobody left waiting to join it.
  pub fn detach(mut self) {
    self.tx.take();
    self.worker.take();
  }
}

impl Default for ThreadExecutor {
  fn default() -> Self {
    Self::new()
  }
}

impl Executor for ThreadExecutor {
  fn schedule(&self, task: Box<dyn Task + Send>) {
    trace!("scheduling task on {:?}", self.id);
    if let Some(tx) = &self.tx {
      // A closed channel means the worker is gone; dropping the task is
      // all a fire-and-forget contract can do about it.
      let _ = tx.send(task);
    }
  }

  fn id(&self) -> ExecutorId {
    self.id
  }
}

impl Drop for ThreadExecutor {
  fn drop(&mut self) {
    self.tx.take(); // close the channel so the worker winds down
    if let Some(worker) = self.worker.take() {
      let _ = worker.join();
    }
  }
}

fn worker_loop(rx: Receiver<Box<dyn Task + Send>>) {
  let mut queue: VecDeque<Box<dyn Task + Send>> = VecDeque::new();
  debug!("worker up");
  loop {
    // Top up the local queue without blocking; block only when idle.
    while let Ok(task) = rx.try_recv() {
      queue.push_back(task);
    }
    let mut task = match queue.pop_front() {
      Some(task) => task,
      None => match rx.recv() {
        Ok(task) => task,
        Err(_) => break, // channel closed and queue drained
      },
    };
    match task.invoke() {
      Ok(TaskStatus::Repeat) => queue.push_back(task),
      Ok(TaskStatus::Finished) => {}
      Err(e) => error!("task failed: {}", e),
    }
  }
  debug!("worker down");
}
