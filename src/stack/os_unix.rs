//! `mmap`-backed stacks with a guard page below them, so an overflow
//! faults loudly instead of scribbling over a neighbour.

use std::fmt;
use std::io;
use std::ptr::null_mut;

use libc::{c_int, MAP_ANONYMOUS, MAP_FAILED, MAP_FIXED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE};

use super::{check_bounds, Stack};
use crate::error::Error;

const PROT: i32 = PROT_READ | PROT_WRITE;

const GUARD_FLAGS: c_int = MAP_ANONYMOUS | MAP_PRIVATE;

#[cfg(any(
  target_os = "dragonfly",
  target_os = "freebsd",
  target_os = "linux",
  target_os = "netbsd",
  target_os = "openbsd"
))]
const STACK_FLAGS: c_int = MAP_ANONYMOUS | MAP_PRIVATE | MAP_FIXED | libc::MAP_STACK;
#[cfg(not(any(
  target_os = "dragonfly",
  target_os = "freebsd",
  target_os = "linux",
  target_os = "netbsd",
  target_os = "openbsd"
)))]
const STACK_FLAGS: c_int = MAP_ANONYMOUS | MAP_PRIVATE | MAP_FIXED;

/// An `mmap`ed stack with one inaccessible page at its low end.
pub struct OsStack {
  start: *mut u8, // base of the guard page
  size: u32,      // usable bytes, a whole number of pages
  page: u32,
}

impl OsStack {
  /// Maps `size` usable bytes (rounded up to whole pages) plus a guard
  /// page below them.
  pub fn new(size: u32, page_size: PageSize) -> Result<OsStack, Error> {
    check_bounds(size)?;
    let size = page_size.round(size);
    let guard = page_size.size();
    let total = guard + size;
    // Reserve the whole range inaccessible first; the guard page simply
    // never becomes accessible.
    let start = unsafe { libc::mmap(null_mut(), total as usize, PROT_NONE, GUARD_FLAGS, -1, 0) };
    if start == MAP_FAILED {
      log::debug!("stack reservation failed: {}", io::Error::last_os_error());
      return Err(Error::OutOfMemory);
    }
    let usable = unsafe { start.cast::<u8>().add(guard as usize) };
    let mapped = unsafe { libc::mmap(usable.cast(), size as usize, PROT, STACK_FLAGS, -1, 0) };
    if mapped == MAP_FAILED || mapped != usable.cast() {
      log::debug!("stack mapping failed: {}", io::Error::last_os_error());
      unsafe { libc::munmap(start, total as usize) };
      return Err(Error::OutOfMemory);
    }
    Ok(OsStack {
      start: start.cast(),
      size,
      page: guard,
    })
  }
}

impl Drop for OsStack {
  fn drop(&mut self) {
    let total = self.page + self.size;
    unsafe { libc::munmap(self.start.cast(), total as usize) };
  }
}

unsafe impl Stack for OsStack {
  fn end(&self) -> *mut usize {
    let total = self.page + self.size;
    unsafe { self.start.add(total as usize) }.cast()
  }
}

// Exclusively owned mapping; see HeapStack.
unsafe impl Send for OsStack {}

impl fmt::Debug for OsStack {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "OsStack<{:x}-{:x}>", self.start as usize, self.end() as usize)
  }
}

/// A value holding the operating system's standard pagesize (probably 4k).
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct PageSize(u32);

impl PageSize {
  pub fn get() -> io::Result<PageSize> {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      -1 => Err(io::Error::last_os_error()),
      size => Ok(PageSize(size as u32)),
    }
  }

  pub fn size(self) -> u32 {
    self.0
  }

  /// Rounds `size` up to a whole number of pages.
  pub fn round(self, size: u32) -> u32 {
    let ps = self.0;
    (size + ps - 1) / ps * ps
  }
}
