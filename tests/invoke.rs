use std::sync::atomic::{AtomicUsize, Ordering};

use cotask::{Error, Invocation, Invoke, InvokeExt, Pipeline};

fn double(x: i32) -> i32 {
  x * 2
}

#[test]
fn bound_arguments_are_captured() {
  let mut inv = Invocation::bind(double, (21,));
  assert_eq!(inv.invoke(), 42);
  // invokable again, same answer
  assert_eq!(inv.invoke(), 42);
}

#[test]
fn zero_argument_invocations_work() {
  let mut inv = Invocation::new(|| 7);
  assert_eq!(inv.invoke(), 7);
}

#[test]
fn a_chain_of_one_is_the_invocation_itself() {
  let mut bare = Invocation::bind(|a: i32, b: i32| a + b, (40, 2));
  assert_eq!(bare.invoke(), 42);
}

#[test]
fn then_feeds_the_previous_result() {
  let mut chain = Invocation::bind(double, (10,)).then(|n: i32| n + 1).then(double);
  assert_eq!(chain.invoke(), 42);
}

#[test]
fn after_discards_the_previous_result() {
  static RAN: AtomicUsize = AtomicUsize::new(0);
  let mut chain =
    Invocation::bind(double, (4,)).after(|| RAN.fetch_add(1, Ordering::SeqCst) + 1);
  assert_eq!(chain.invoke(), 1);
  assert_eq!(RAN.load(Ordering::SeqCst), 1);
}

#[test]
fn composition_matches_nested_calls() {
  let f = |x: i32| x + 3;
  let g = |x: i32| x * 5;
  let h = |x: i32| x - 7;
  let mut chain = Invocation::bind(f, (4,)).then(g).then(h);
  assert_eq!(chain.invoke(), h(g(f(4))));
}

#[test]
fn pipelines_check_types_at_push_time() {
  let mut p = Pipeline::new();
  p.push_source(|| 21i64);
  assert!(matches!(
    p.push(|s: String| s.len()),
    Err(Error::TypeMismatch { .. })
  ));
  // the pipeline still runs with the stages that did fit
  p.push(|n: i64| n * 2).unwrap();
  let out = p.run().unwrap();
  assert_eq!(*out.downcast::<i64>().unwrap(), 42);
}

#[test]
fn a_pipeline_must_open_with_a_source() {
  let mut p = Pipeline::new();
  assert!(matches!(
    p.push(|n: i64| n),
    Err(Error::TypeMismatch { .. })
  ));
  assert!(p.is_empty());
}

#[test]
fn sources_discard_whatever_came_before() {
  let mut p = Pipeline::new();
  p.push_source(|| "ignored");
  p.push_source(|| 5u8);
  assert_eq!(p.len(), 2);
  let out = p.run().unwrap();
  assert_eq!(*out.downcast::<u8>().unwrap(), 5);
}

#[test]
fn an_empty_pipeline_produces_nothing() {
  let mut p = Pipeline::new();
  assert!(p.run().is_none());
}
