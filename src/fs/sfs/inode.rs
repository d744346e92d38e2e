//! Inode records and their index / mode newtypes.
//!
//! Every filesystem object is described by one 32-byte inode record in the
//! inode table. The record's `ino` field doubles as the intrusive
//! free-list link while the record is unallocated.

use bytemuck::{Pod, Zeroable};

use super::header::{DIRECT_SLOTS, INODE_SIZE};
use crate::time::UnixTimestamp32;

/// A number identifying one inode record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeNumber(u16);

impl InodeNumber {
    /// Inode 0 is the reserved invalid sentinel; it always points at itself
    /// so list heads can be dereferenced harmlessly.
    pub const INVALID: Self = Self(0);

    /// Inode 1 is reserved for the root directory of the filesystem.
    pub const ROOT: Self = Self(1);

    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl From<u16> for InodeNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<InodeNumber> for u16 {
    fn from(value: InodeNumber) -> Self {
        value.0
    }
}

impl From<InodeNumber> for usize {
    fn from(value: InodeNumber) -> Self {
        usize::from(value.0)
    }
}

impl core::fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

/// A number identifying one block of the data region.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BlockId(u16);

impl BlockId {
    /// Block 0 is the reserved invalid sentinel; it always points at itself
    /// so list heads can be dereferenced harmlessly.
    pub const INVALID: Self = Self(0);

    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl From<u16> for BlockId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<BlockId> for u16 {
    fn from(value: BlockId) -> Self {
        value.0
    }
}

impl From<BlockId> for usize {
    fn from(value: BlockId) -> Self {
        usize::from(value.0)
    }
}

impl core::fmt::Display for BlockId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

/// Packed file type and permission bits.
///
/// The POSIX type bits are shifted right by 3 so that the type and the 9
/// permission bits coexist in a 16-bit field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Pod, Zeroable)]
#[repr(transparent)]
pub struct FileMode(u16);

impl FileMode {
    /// Mask of the packed type bits.
    pub const TYPE_MASK: Self = Self(0o17000);

    /// Regular file (`S_IFREG >> 3`).
    pub const S_IFREG: Self = Self(0o10000);

    /// Directory (`S_IFDIR >> 3`).
    pub const S_IFDIR: Self = Self(0o4000);

    /// Symbolic link (`S_IFLNK >> 3`).
    pub const S_IFLNK: Self = Self(0o12000);

    /// Mask of the 9 permission bits.
    pub const PERM_MASK: Self = Self(0o777);

    /// Packs a host `st_mode`-style value.
    #[must_use]
    pub fn from_host(mode: u32) -> Self {
        Self((((mode & 0o170_000) >> 3) | (mode & 0o777)) as u16)
    }

    /// Unpacks into a host `st_mode`-style value.
    #[must_use]
    pub fn to_host(self) -> u32 {
        (u32::from(self.0 & Self::TYPE_MASK.0) << 3) | u32::from(self.0 & Self::PERM_MASK.0)
    }

    /// A directory mode carrying the given permission bits.
    #[must_use]
    pub fn directory(perms: u16) -> Self {
        Self(Self::S_IFDIR.0 | (perms & Self::PERM_MASK.0))
    }

    /// A regular-file mode carrying the given permission bits.
    #[must_use]
    pub fn regular(perms: u16) -> Self {
        Self(Self::S_IFREG.0 | (perms & Self::PERM_MASK.0))
    }

    #[must_use]
    pub fn file_type(self) -> FileType {
        FileType::from(self)
    }

    #[must_use]
    pub fn is_dir(self) -> bool {
        self.0 & Self::TYPE_MASK.0 == Self::S_IFDIR.0
    }

    /// The 9 permission bits.
    #[must_use]
    pub fn permissions(self) -> u16 {
        self.0 & Self::PERM_MASK.0
    }

    /// Replaces the permission bits, leaving the type bits alone.
    pub fn set_permissions(&mut self, perms: u16) {
        self.0 = (self.0 & Self::TYPE_MASK.0) | (perms & Self::PERM_MASK.0);
    }
}

/// Type associated to a given inode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    SymbolicLink,
    Unknown,
}

impl From<FileMode> for FileType {
    fn from(value: FileMode) -> Self {
        match FileMode(value.0 & FileMode::TYPE_MASK.0) {
            FileMode::S_IFREG => Self::Regular,
            FileMode::S_IFDIR => Self::Directory,
            FileMode::S_IFLNK => Self::SymbolicLink,
            _ => Self::Unknown,
        }
    }
}

impl core::fmt::Display for FileType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let type_str = match self {
            FileType::Regular => "file",
            FileType::Directory => "directory",
            FileType::SymbolicLink => "symlink",
            FileType::Unknown => "unknown",
        };

        f.write_str(type_str)
    }
}

/// One 32-byte inode record.
///
/// While the record is live, `ino` holds its own index; while it sits on the
/// free list, `ino` holds the index of the next free record. Block pointers
/// use [`BlockId::INVALID`] for unassigned slots.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct RawInode {
    /// Self index when live, next free record when free.
    pub ino: InodeNumber,
    /// Owner user id.
    pub uid: u8,
    /// Owner group id.
    pub gid: u8,
    /// Packed type and permission bits.
    pub mode: FileMode,
    /// Number of directory entries naming this inode.
    pub refs: u16,
    /// Logical byte size.
    pub size: u32,
    /// Last modification, seconds since the epoch.
    pub time: UnixTimestamp32,
    /// Direct block slots.
    pub block: [BlockId; DIRECT_SLOTS],
    /// Single-indirect pointer block.
    pub block_p: BlockId,
    /// Double-indirect pointer block.
    pub block_pp: BlockId,
}

const _: () = assert!(core::mem::size_of::<RawInode>() == INODE_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout() {
        assert_eq!(core::mem::size_of::<RawInode>(), 32);
    }

    #[test]
    fn mode_packs_host_bits() {
        let dir = FileMode::from_host(0o040_755);
        assert!(dir.is_dir());
        assert_eq!(dir.permissions(), 0o755);
        assert_eq!(dir.to_host(), 0o040_755);

        let reg = FileMode::from_host(0o100_644);
        assert_eq!(reg.file_type(), FileType::Regular);
        assert_eq!(reg.to_host(), 0o100_644);
    }

    #[test]
    fn mode_constructors_match_host_encoding() {
        assert_eq!(FileMode::directory(0o755), FileMode::from_host(0o040_755));
        assert_eq!(FileMode::regular(0o644), FileMode::from_host(0o100_644));
    }

    #[test]
    fn set_permissions_keeps_type_bits() {
        let mut mode = FileMode::directory(0o755);
        mode.set_permissions(0o700);
        assert!(mode.is_dir());
        assert_eq!(mode.permissions(), 0o700);
    }

    #[test]
    fn sentinels_are_invalid() {
        assert!(!InodeNumber::INVALID.is_valid());
        assert!(!BlockId::INVALID.is_valid());
        assert!(InodeNumber::ROOT.is_valid());
    }
}
