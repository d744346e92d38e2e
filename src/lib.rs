//! A small POSIX-style filesystem kept entirely in one contiguous byte
//! region, persisted by dumping that region to a host file.
//!
//! The core lives under [`fs::sfs`]; [`vfs`] exposes the errno-style call
//! surface a userspace filesystem host drives.

pub mod errors;
#[macro_use]
pub mod log;
pub mod fs;
pub mod image;
pub mod time;
pub mod vfs;
