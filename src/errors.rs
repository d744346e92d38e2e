//! Error types shared across the crate.

use core::fmt::Debug;

/// Marker trait tying the crate's error enums together.
///
/// Requiring [`Debug`] keeps every error printable at call sites that only
/// log it and move on.
pub trait BaseError: Debug {}

/// Shorthand for operations whose only interesting outcome is the error.
pub type CanFail<T> = Result<(), T>;

/// Return type of the filesystem core.
pub type FsResult<T> = Result<T, FsError>;

pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EEXIST: i32 = 17;
pub const ENOTDIR: i32 = 20;
pub const EISDIR: i32 = 21;
pub const EINVAL: i32 = 22;
pub const ENFILE: i32 = 23;
pub const EFBIG: i32 = 27;
pub const ENOSPC: i32 = 28;
pub const ENAMETOOLONG: i32 = 36;
pub const ENOTEMPTY: i32 = 39;

/// `FsError` defines the error conditions raised by the filesystem core.
///
/// Each variant maps onto the POSIX errno the adapter surface reports
/// through [`FsError::errno`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    /// A path component does not exist.
    NoEntry,

    /// A non-leaf path component, or the target of a directory-only
    /// operation, is not a directory.
    NotDirectory,

    /// The target of a file-only operation is a directory.
    IsDirectory,

    /// A directory entry with that name already exists.
    Exists,

    /// The directory still holds entries besides `.` and `..`.
    NotEmpty,

    /// The data-block free list is exhausted.
    NoSpace,

    /// The inode free list is exhausted.
    NoInodes,

    /// A directory payload grew past the scratch bound.
    DirTooBig,

    /// An entry name or a full path is longer than the filesystem allows.
    NameTooLong,

    /// Malformed path (relative, empty leaf, embedded NUL byte).
    InvalidPath,

    /// The pointer tree references an invalid slot below the live size.
    Corrupted,

    /// No image is installed behind the adapter surface.
    NotMounted,
}

impl BaseError for FsError {}

impl FsError {
    /// The positive errno value this error surfaces as.
    #[must_use]
    pub fn errno(self) -> i32 {
        match self {
            FsError::NoEntry => ENOENT,
            FsError::NotDirectory => ENOTDIR,
            FsError::IsDirectory => EISDIR,
            FsError::Exists => EEXIST,
            FsError::NotEmpty => ENOTEMPTY,
            FsError::NoSpace => ENOSPC,
            FsError::NoInodes => ENFILE,
            FsError::DirTooBig => EFBIG,
            FsError::NameTooLong => ENAMETOOLONG,
            FsError::InvalidPath => EINVAL,
            FsError::Corrupted => EIO,
            FsError::NotMounted => EIO,
        }
    }
}

/// `MountError` defines the error conditions raised while installing a
/// filesystem over a raw byte region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountError {
    /// The region cannot be read from or written to the backing file.
    IOError,

    /// The region length is not a usable whole number of blocks.
    SizeMismatch,

    /// The header does not describe this region.
    BadHeader,

    /// Building the initial root directory failed.
    Init(FsError),
}

impl BaseError for MountError {}
