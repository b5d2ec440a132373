//! Callable binding and composition.
//!
//! An [`Invocation`] owns a callable and its eagerly captured arguments
//! and presents them as a single zero-argument unit. [`InvokeExt::then`]
//! and [`InvokeExt::after`] compose units into pipelines; whether a stage
//! receives the previous result is settled by which combinator was
//! chosen, at compile time, never by probing call shapes at runtime.
//! [`Pipeline`] is the boxed, runtime-checked rendition for stage lists
//! that only exist at runtime.

mod pipeline;
pub use pipeline::{BoxedValue, Pipeline};

/// Arity-generic call interface, implemented for plain functions and
/// `FnMut` closures of up to eight arguments. The argument list travels
/// as a tuple; the impl carries the callable's arity and types, so stage
/// compatibility is known wherever the callable goes.
pub trait Callable<Args> {
  type Output;

  fn call(&mut self, args: Args) -> Self::Output;
}

macro_rules! impl_callable {
  ($($arg:ident),*) => {
    impl<Fun, Ret, $($arg),*> Callable<($($arg,)*)> for Fun
    where Fun: FnMut($($arg),*) -> Ret {
      type Output = Ret;

      fn call(&mut self, args: ($($arg,)*)) -> Ret {
        #[allow(non_snake_case)]
        let ($($arg,)*) = args;
        self($($arg),*)
      }
    }
  };
}

impl_callable!();
impl_callable!(A);
impl_callable!(A, B);
impl_callable!(A, B, C);
impl_callable!(A, B, C, D);
impl_callable!(A, B, C, D, E);
impl_callable!(A, B, C, D, E, F);
impl_callable!(A, B, C, D, E, F, G);
impl_callable!(A, B, C, D, E, F, G, H);

/// A unit invokable with no arguments, any number of times.
pub trait Invoke {
  type Output;

  fn invoke(&mut self) -> Self::Output;
}

/// A callable bound with captured arguments, immutable after
/// construction.
pub struct Invocation<F, A = ()> {
  func: F,
  args: A,
}

impl<F> Invocation<F, ()>
where
  F: Callable<()>,
{
  /// Wraps a callable that needs no arguments.
  pub fn new(func: F) -> Self {
    Invocation { func, args: () }
  }
}

impl<F, A> Invocation<F, A>
where
  F: Callable<A>,
  A: Clone,
{
  /// Binds `args` to `func`. Compatibility between the two is settled
  /// right here; an invocation that constructs will also invoke.
  pub fn bind(func: F, args: A) -> Self {
    Invocation { func, args }
  }
}

impl<F, A> Invoke for Invocation<F, A>
where
  F: Callable<A>,
  A: Clone,
{
  type Output = F::Output;

  fn invoke(&mut self) -> F::Output {
    self.func.call(self.args.clone())
  }
}

/// Stage pair where the second callable consumes the first's result.
pub struct Then<S, G> {
  prev: S,
  next: G,
}

/// Stage pair where the second callable takes nothing; the first's
/// result is dropped.
pub struct After<S, G> {
  prev: S,
  next: G,
}

impl<S, G> Invoke for Then<S, G>
where
  S: Invoke,
  G: Callable<(S::Output,)>,
{
  type Output = G::Output;

  fn invoke(&mut self) -> G::Output {
    let mid = self.prev.invoke();
    self.next.call((mid,))
  }
}

impl<S, G> Invoke for After<S, G>
where
  S: Invoke,
  G: Callable<()>,
{
  type Output = G::Output;

  fn invoke(&mut self) -> G::Output {
    self.prev.invoke();
    self.next.call(())
  }
}

/// Chain-building sugar for anything invokable. A chain of one element
/// is the bare invocation itself; these only ever wrap.
pub trait InvokeExt: Invoke + Sized {
  /// Appends a stage taking this chain's result as its sole argument.
  fn then<G>(self, next: G) -> Then<Self, G>
  where
    G: Callable<(Self::Output,)>,
  {
    Then { prev: self, next }
  }

  /// Appends a zero-argument stage; this chain's result is dropped.
  fn after<G>(self, next: G) -> After<Self, G>
  where
    G: Callable<()>,
  {
    After { prev: self, next }
  }
}

impl<T: Invoke> InvokeExt for T {}
