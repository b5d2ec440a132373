#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::*;

#[cfg(all(target_arch = "x86_64", unix))]
mod x86_64_unix;
#[cfg(all(target_arch = "x86_64", unix))]
pub use x86_64_unix::*;

#[cfg(not(any(target_arch = "aarch64", all(target_arch = "x86_64", unix))))]
compile_error!("Unsupported target platform!");
