//! Logging macros for the mount paths and the CLI.
//!
//! Records go to stderr, leaving stdout to the adapter surface. Both macros
//! accept an optional context literal ahead of the format arguments and
//! emit `[level] context : message` lines.

use core::fmt;
use std::io::{self, Write};

#[doc(hidden)]
pub fn write_record(level: &str, ctx: Option<&str>, args: fmt::Arguments) {
    let mut out = io::stderr().lock();
    let _ = match ctx {
        Some(ctx) => writeln!(out, "[{level}] {ctx} : {args}"),
        None => writeln!(out, "[{level}] {args}"),
    };
}

/// Emits an informational record.
///
/// A context literal ahead of the format string names the subsystem the
/// record belongs to.
///
/// # Examples
///
/// ```
/// use sfs::info;
///
/// info!("sfs", "image mounted");
/// ```
#[macro_export]
macro_rules! info {
    // Context-tagged form.
    ($ctx: literal, $($arg: tt)*) => {
        $crate::log::write_record("info", Some($ctx), format_args!($($arg)*))
    };
    ($($arg: tt)*) => {
        $crate::log::write_record("info", None, format_args!($($arg)*))
    };
}

/// Emits an error record.
///
/// A context literal ahead of the format string names the subsystem the
/// record belongs to.
///
/// # Examples
///
/// ```
/// use sfs::error;
///
/// error!("sfs", "failed to load the disk image");
/// ```
#[macro_export]
macro_rules! error {
    // Context-tagged form.
    ($ctx: literal, $($arg: tt)*) => {
        $crate::log::write_record("error", Some($ctx), format_args!($($arg)*))
    };
    ($($arg: tt)*) => {
        $crate::log::write_record("error", None, format_args!($($arg)*))
    };
}
