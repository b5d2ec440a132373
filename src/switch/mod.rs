//! Raw execution-context switching.
//!
//! A paused context is nothing but a stack pointer: everything the
//! machine needs to continue is spilled right next to it, in a layout
//! both sides of a switch agree on. Two primitives: [`prepare`] starts a
//! new call chain on a fresh stack, [`swap`] trades the running context
//! for a paused one. Whoever holds a paused pointer may resume it exactly
//! once; resuming hands them back a new one.

mod arch;
pub use arch::*;

use core::mem::ManuallyDrop;

/// Entry function installed by [`prepare`]: receives the paused stack of
/// whoever resumed it first, plus an opaque word (in practice a closure
/// address).
pub type EntryFn = unsafe extern "C" fn(*mut usize, *const u8);

/// What [`swap`] hands back: the other side's freshly paused stack and
/// the word it passed along.
#[repr(C)]
pub struct Switch {
  pub stack: *mut usize,
  pub arg: usize,
}

/// Moves `closure` onto the new stack and parks it there. The first
/// [`swap`] to the returned pointer calls the closure with the resuming
/// context's paused stack and its argument word.
///
/// # Safety
///
/// * `stack` must be the end address of a properly aligned stack region.
/// * The region must have a guard page, or be big enough never to
///   overflow (red zone and signal space included).
/// * The closure must never return and never unwind; escape via [`swap`],
///   catching any panic before it reaches the closure's own frame.
pub unsafe fn link_closure<F>(stack: *mut usize, closure: F) -> *mut usize
where
  F: FnOnce(*mut usize, usize),
{
  let f = ManuallyDrop::new(closure);
  let f = (&f as *const ManuallyDrop<F>).cast::<u8>();
  prepare(bootstrap::<F>, f, stack)
}

unsafe extern "C" fn bootstrap<F>(stack: *mut usize, closure: *const u8)
where
  F: FnOnce(*mut usize, usize),
{
  // The closure still lives in the frame that called link_closure; move
  // it onto this stack before that frame can go away.
  let f = closure.cast::<F>().read();
  let sw = swap(stack, 0);
  f(sw.stack, sw.arg);
  // The closure broke its contract if we get here.
  std::process::abort();
}
