//! x86-64 keeps this short: spill the little the compiler cannot spill
//! for us, trade stack pointers, branch. `rbx` and `rbp` may not appear
//! as operands (the compiler reserves them), so they are saved by hand in
//! the red zone; every other callee-saved register is declared as a
//! clobber and spilled around the block automatically.
//!
//! ABI notes:
//!
//! * `rsp` must be 16-byte aligned at every call instruction.
//! * The 128-byte red zone below `rsp` is ours between switches; signal
//!   frames land below it.
//!
//! Internal convention, both directions: a paused context is its `rsp`,
//! with the resume address at `[rsp - 8]`, the frame pointer at
//! `[rsp - 16]` and `rbx` at `[rsp - 24]`. On arrival, `rsi` carries the
//! transferred word and `rdx` the other side's paused stack.

use crate::switch::{EntryFn, Switch};
use core::arch::asm;

/// Starts a new call chain on `stack`, entering `entry` through a
/// trampoline frame. Runs the new context until it switches away for the
/// first time, then returns its paused stack pointer.
///
/// # Safety
///
/// * `stack` must be a 16-byte aligned one-past-the-end pointer of a
///   live region that has a guard page or will not overflow.
/// * `entry` must never return.
#[inline(always)]
pub unsafe extern "C" fn prepare(entry: EntryFn, arg: *const u8, mut stack: *mut usize) -> *mut usize {
  asm!(
    // Pause ourselves: resume address, frame pointer and rbx go into the
    // red zone; rsp itself becomes the resume token.
    "lea rax, [rip + 2f]",
    "mov [rsp - 8],  rax",
    "mov [rsp - 16], rbp",
    "mov [rsp - 24], rbx",
    // Seed the new stack with the trampoline and the entry function.
    "lea rcx, [rip + {tramp}]",
    "mov [rdx - 8],  rcx",
    "mov [rdx - 16], rdi",
    // entry(paused_rsp, arg): first argument is our paused stack.
    "mov rdi, rsp",
    // Zeroed rbp marks the top of the new call chain.
    "xor rbp, rbp",
    "xor rbx, rbx",
    "lea rsp, [rdx - 16]",
    "jmp rcx",
    // Resumed. rdx holds the paused stack of whoever switched to us.
    "2:",
    tramp = sym cotask_trampoline,
    inout("rdi") entry => _,
    inout("rsi") arg => _,
    inout("rdx") stack,
    out("rcx") _,
    out("rax") _,
    out("r12") _, out("r13") _, out("r14") _, out("r15") _,
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
    "lea rax, [rip + 2f]",
    "mov [rsp - 8],  rax",
    "mov [rsp - 16], rbp",
    "mov [rsp - 24], rbx",
    // Trade stacks; our paused rsp travels over in rdx.
    "mov rdx, rsp",
    "mov rsp, rdi",
    // Undo the other side's pause and continue where it left off.
    "mov rbx, [rsp - 24]",
    "mov rbp, [rsp - 16]",
    "mov rax, [rsp - 8]",
    "jmp rax",
    "2:",
    inout("rdi") stack => _,
    inout("rsi") arg,
    out("rdx") stack,
    out("rax") _, out("rcx") _,
    out("r12") _, out("r13") _, out("r14") _, out("r15") _,
    clobber_abi("C"),
  );
  Switch { stack, arg }
}

/* Trampoline (terminates the call chain, becoming the first frame):
 * - entered with the entry function at [rsp];
 * - calls it in a new frame, restoring the ABI's alignment phase;
 * - expects it never to return.
 */
extern "C" {
  fn cotask_trampoline();
}

core::arch::global_asm!(
  ".global cotask_trampoline",
  ".align 16",
  "cotask_trampoline:",
  ".cfi_startproc simple",
  ".cfi_undefined rip", // unwinders and debuggers stop walking here
  ".cfi_undefined rsp",
  "call qword ptr [rsp]",
  ".cfi_endproc",
);
