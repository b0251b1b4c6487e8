pub mod cpu;

#[cfg(target_os = "linux")]
pub mod sys;

#[cfg(not(target_os = "linux"))]
pub mod portable_stubs;

#[cfg(not(target_os = "linux"))]
pub use portable_stubs::*;
