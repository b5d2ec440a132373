//! aarch64 version of the same scheme, with real pushes since there is
//! no red zone to lean on. `x19` may not appear as an operand (the
//! compiler reserves it), so it is saved by hand; `x20` rides along in
//! the same pair to keep `sp` 16-byte aligned. The remaining callee-saved
//! registers, including the low halves of v8-v15, are declared as
//! clobbers and spilled around the block automatically.
//!
//! Internal convention, both directions: a paused context is its `sp`,
//! pointing at a 32-byte save area of `{x19, x20, fp, lr}`. On arrival,
//! `x1` carries the transferred word and `x2` the other side's paused
//! stack. No trampoline is needed: there is no post-call alignment phase
//! to restore, and zeroed `fp`/`lr` already terminate the new call
//! chain.

use crate::switch::{EntryFn, Switch};
use core::arch::asm;

/// Starts a new call chain on `stack`, entering `entry` directly. Runs
/// the new context until it switches away for the first time, then
/// returns its paused stack pointer.
///
/// # Safety
///
/// * `stack` must be a 16-byte aligned one-past-the-end pointer of a
///   live region that has a guard page or will not overflow.
/// * `entry` must never return.
#[inline(always)]
pub unsafe extern "C" fn prepare(entry: EntryFn, arg: *const u8, mut stack: *mut usize) -> *mut usize {
  asm!(
    // Pause ourselves: resume address into lr, then fp/lr and x19/x20
    // onto the stack. sp becomes the resume token.
    "adr x30, 2f",
    "stp x29, x30, [sp, #-16]!",
    "stp x19, x20, [sp, #-16]!",
    "mov x3, sp",
    // Adopt the new stack; zeroed fp/lr terminate the new call chain.
    "mov sp, x2",
    "mov x29, xzr",
    "mov x30, xzr",
    // entry(paused_sp, arg); the entry address must survive the shuffle.
    "mov x4, x0",
    "mov x0, x3",
    "br x4",
    // Resumed. x2 holds the paused stack of whoever switched to us.
    "2:",
    inout("x0") entry => _,
    inout("x1") arg => _,
    inout("x2") stack,
    out("x3") _, out("x4") _,
    out("x21") _, out("x22") _, out("x23") _, out("x24") _,
    out("x25") _, out("x26") _, out("x27") _, out("x28") _,
    out("v8") _, out("v9") _, out("v10") _, out("v11") _,
    out("v12") _, out("v13") _, out("v14") _, out("v15") _,
    clobber_abi("C"),
  );
  stack
}

/// Pauses the running context and resumes `stack`, carrying `arg`
/// across.
///
/// # Safety
///
/// * `stack` must have been produced by [`prepare`] or by a pause in
///   `swap`, on this thread, and not resumed since.
#[inline(always)]
pub unsafe extern "C" fn swap(mut stack: *mut usize, mut arg: usize) -> Switch {
  asm!(
    // Spill, same layout as prepare.
    "adr x30, 2f",
    "stp x29, x30, [sp, #-16]!",
    "stp x19, x20, [sp, #-16]!",
    // Trade stacks; our paused sp travels over in x2.
    "mov x2, sp",
    "mov sp, x0",
    // Undo the other side's pause and continue where it left off.
    "ldp x19, x20, [sp], #16",
    "ldp x29, x30, [sp], #16",
    "ret",
    "2:",
    inout("x0") stack => _,
    inout("x1") arg,
    out("x2") stack,
    out("x21") _, out("x22") _, out("x23") _, out("x24") _,
    out("x25") _, out("x26") _, out("x27") _, out("x28") _,
    out("v8") _, out("v9") _, out("v10") _, out("v11") _,
    out("v12") _, out("v13") _, out("v14") _, out("v15") _,
    clobber_abi("C"),
  );
  Switch { stack, arg }
}
