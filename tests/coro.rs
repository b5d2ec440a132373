use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cotask::{
  registry, this_task, CoroTask, Error, ExecutorId, Invocation, Task, TaskStatus, MAX_STACK_SIZE,
};

struct BumpOnDrop(Arc<AtomicUsize>);

impl Drop for BumpOnDrop {
  fn drop(&mut self) {
    self.0.fetch_add(1, Ordering::SeqCst);
  }
}

#[test]
fn yield_once_then_finish() {
  let steps = Arc::new(AtomicUsize::new(0));
  let s = steps.clone();
  let mut task = CoroTask::new(Invocation::new(move || {
    s.store(1, Ordering::SeqCst);
    this_task::yield_now();
    s.store(2, Ordering::SeqCst);
  }))
  .unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  // the code past the yield point has not run yet
  assert_eq!(steps.load(Ordering::SeqCst), 1);
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
  assert_eq!(steps.load(Ordering::SeqCst), 2);
}

#[test]
fn statuses_are_repeats_then_exactly_one_finish() {
  let mut task = CoroTask::new(Invocation::new(|| {
    for _ in 0..5 {
      this_task::yield_now();
    }
  }))
  .unwrap();
  let mut statuses = Vec::new();
  loop {
    let status = task.invoke().unwrap();
    statuses.push(status);
    if status == TaskStatus::Finished {
      break;
    }
  }
  assert_eq!(statuses.len(), 6);
  assert!(statuses[..5].iter().all(|s| *s == TaskStatus::Repeat));
  assert_eq!(statuses[5], TaskStatus::Finished);
}

#[test]
fn invoking_after_finish_is_refused() {
  let mut task = CoroTask::new(Invocation::new(|| {})).unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
  assert!(matches!(task.invoke(), Err(Error::InvokedAfterFinish)));
}

#[test]
fn stack_bounds_are_checked_before_any_context_exists() {
  assert!(matches!(
    CoroTask::with_stack_size(Invocation::new(|| {}), 1024),
    Err(Error::StackBounds { .. })
  ));
  assert!(matches!(
    CoroTask::with_stack_size(Invocation::new(|| {}), MAX_STACK_SIZE + 1),
    Err(Error::StackBounds { .. })
  ));
}

#[test]
fn yields_need_no_handle_even_deep_in_the_call_tree() {
  fn helper() {
    this_task::yield_now();
  }
  let mut task = CoroTask::new(Invocation::new(|| helper())).unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
}

#[test]
fn yield_outside_any_coroutine_is_a_noop() {
  assert!(!this_task::yield_now());
  assert!(!this_task::cancel_requested());
}

#[test]
fn body_panics_are_captured_at_the_invoke_boundary() {
  let mut task = CoroTask::new(Invocation::new(|| {
    this_task::yield_now();
    panic!("boom");
  }))
  .unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  match task.invoke() {
    Err(Error::BodyPanicked(msg)) => assert!(msg.contains("boom")),
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert!(matches!(task.invoke(), Err(Error::InvokedAfterFinish)));
}

#[test]
fn cancel_before_start_skips_the_body() {
  let ran = Arc::new(AtomicUsize::new(0));
  let r = ran.clone();
  let mut task = CoroTask::new(Invocation::new(move || {
    r.store(1, Ordering::SeqCst);
  }))
  .unwrap();
  task.cancel();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
  assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn cancel_while_suspended_unwinds_at_the_yield_point() {
  let drops = Arc::new(AtomicUsize::new(0));
  let after_yield = Arc::new(AtomicUsize::new(0));
  let d = drops.clone();
  let a = after_yield.clone();
  let mut task = CoroTask::new(Invocation::new(move || {
    let _guard = BumpOnDrop(d.clone());
    this_task::yield_now();
    a.store(1, Ordering::SeqCst);
  }))
  .unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  task.cancel();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
  assert_eq!(drops.load(Ordering::SeqCst), 1);
  assert_eq!(after_yield.load(Ordering::SeqCst), 0);
}

#[test]
fn dropping_a_suspended_task_runs_its_destructors() {
  let drops = Arc::new(AtomicUsize::new(0));
  let d = drops.clone();
  let mut task = CoroTask::new(Invocation::new(move || {
    let _guard = BumpOnDrop(d.clone());
    this_task::yield_now();
    this_task::yield_now();
  }))
  .unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  drop(task);
  assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn a_started_coroutine_refuses_to_migrate() {
  let mut task = CoroTask::new(Invocation::new(|| {
    this_task::yield_now();
  }))
  .unwrap();
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  let (result, task) = std::thread::spawn(move || {
    let mut task = task;
    let result = task.invoke();
    (result, task)
  })
  .join()
  .unwrap();
  assert!(matches!(result, Err(Error::CrossThreadResume)));
  // back home, the drop unwinds the body cleanly
  drop(task);
}

#[test]
fn the_running_context_is_registered_under_its_key() {
  let key = ExecutorId::fresh();
  let seen = Arc::new(AtomicBool::new(false));
  let s = seen.clone();
  let mut task = CoroTask::new(Invocation::new(move || {
    s.store(registry::is_registered(key), Ordering::SeqCst);
  }))
  .unwrap()
  .keyed(key);
  assert!(!registry::is_registered(key));
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
  assert!(seen.load(Ordering::SeqCst));
  assert!(!registry::is_registered(key));
}

#[test]
fn nested_tasks_with_the_same_identity_are_rejected() {
  let key = ExecutorId::fresh();
  let verdict = Arc::new(Mutex::new(None));
  let v = verdict.clone();
  let mut outer = CoroTask::new(Invocation::new(move || {
    let mut inner = CoroTask::new(Invocation::new(|| {})).unwrap().keyed(key);
    *v.lock().unwrap() = Some(matches!(inner.invoke(), Err(Error::Reentrancy)));
  }))
  .unwrap()
  .keyed(key);
  assert_eq!(outer.invoke().unwrap(), TaskStatus::Finished);
  assert_eq!(*verdict.lock().unwrap(), Some(true));
}

#[test]
fn two_tasks_interleave_when_driven_alternately() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let make = |tag: &'static str, log: Arc<Mutex<Vec<&'static str>>>| {
    CoroTask::new(Invocation::new(move || {
      log.lock().unwrap().push(tag);
      this_task::yield_now();
      log.lock().unwrap().push(tag);
    }))
    .unwrap()
  };
  let mut a = make("a", log.clone());
  let mut b = make("b", log.clone());
  assert_eq!(a.invoke().unwrap(), TaskStatus::Repeat);
  assert_eq!(b.invoke().unwrap(), TaskStatus::Repeat);
  assert_eq!(a.invoke().unwrap(), TaskStatus::Finished);
  assert_eq!(b.invoke().unwrap(), TaskStatus::Finished);
  assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a", "b"]);
}

#[cfg(unix)]
#[test]
fn coroutines_run_on_os_stacks_too() {
  use cotask::stack::{OsStack, PageSize};
  let stack = OsStack::new(cotask::MIN_STACK_SIZE, PageSize::get().unwrap()).unwrap();
  let mut task = CoroTask::on_stack(
    Invocation::new(|| {
      this_task::yield_now();
    }),
    stack,
  );
  assert_eq!(task.invoke().unwrap(), TaskStatus::Repeat);
  assert_eq!(task.invoke().unwrap(), TaskStatus::Finished);
}
