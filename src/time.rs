//! Time related utilities.
//!
//! Inode records carry a 32-bit modification time; [`now`] samples the host
//! clock into that representation.

use bytemuck::{Pod, Zeroable};
use std::time::{SystemTime, UNIX_EPOCH};

/// A 32-bit count of seconds since the Unix `epoch`, as stored in inode
/// records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct UnixTimestamp32(u32);

impl UnixTimestamp32 {
    /// Unix `epoch`
    pub const EPOCH: Self = Self(0);

    /// Returns the number of seconds that have elapsed since the Unix
    /// `epoch`.
    #[must_use]
    pub fn raw_seconds(self) -> u32 {
        self.0
    }
}

impl From<u32> for UnixTimestamp32 {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<UnixTimestamp32> for u32 {
    fn from(value: UnixTimestamp32) -> Self {
        value.0
    }
}

impl core::fmt::Display for UnixTimestamp32 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

/// Returns the current UTC time as seconds since the Unix `epoch`.
///
/// A host clock set before the epoch collapses to the epoch itself.
#[must_use]
pub fn now() -> UnixTimestamp32 {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    UnixTimestamp32((seconds & u64::from(u32::MAX)) as u32)
}
