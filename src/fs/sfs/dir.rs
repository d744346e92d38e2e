//! Directory payloads: entry encoding, lookup and mutation.
//!
//! A directory is a regular inode whose payload is the back-to-back
//! concatenation of variable-length entries:
//!
//! ```text
//! +----------+----------+................+------+
//! | ino: u16 | len: u16 | name: len bytes| NUL  |
//! +----------+----------+................+------+
//! ```
//!
//! `5 + len` bytes per entry; the directory size is the exact byte count of
//! the concatenation. Every directory starts with `.` (itself) and `..`
//! (its parent). Payloads are bounded by [`FS_DIR_MAX`] and staged through a
//! stack scratch buffer for every operation.

use crate::errors::{FsError, FsResult};

use super::header::{FS_DIR_MAX, FS_NAME_MAX};
use super::inode::InodeNumber;
use super::SfsImage;

/// Fixed bytes of an entry in addition to its name: index, length, NUL.
const ENTRY_OVERHEAD: usize = 5;

/// One decoded directory entry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DirEntry<'a> {
    pub ino: InodeNumber,
    pub name: &'a [u8],
}

impl<'a> DirEntry<'a> {
    /// Bytes this entry occupies on-medium.
    pub(crate) fn encoded_len(&self) -> usize {
        ENTRY_OVERHEAD + self.name.len()
    }

    /// The entry name, when it is valid UTF-8.
    pub(crate) fn name_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.name).ok()
    }
}

/// Iterator over the entries of a raw directory payload.
pub(crate) struct DirEntries<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> DirEntries<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Byte offset of the entry the next call will decode.
    pub(crate) fn offset(&self) -> usize {
        self.cursor
    }
}

impl<'a> Iterator for DirEntries<'a> {
    type Item = FsResult<DirEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.buf.len() {
            return None;
        }

        let rest = &self.buf[self.cursor..];
        if rest.len() < ENTRY_OVERHEAD {
            self.cursor = self.buf.len();
            return Some(Err(FsError::Corrupted));
        }

        let ino = u16::from_le_bytes([rest[0], rest[1]]);
        let len = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        if rest.len() < ENTRY_OVERHEAD + len {
            self.cursor = self.buf.len();
            return Some(Err(FsError::Corrupted));
        }

        let name = &rest[4..4 + len];
        self.cursor += ENTRY_OVERHEAD + len;

        Some(Ok(DirEntry {
            ino: InodeNumber::from(ino),
            name,
        }))
    }
}

impl SfsImage {
    /// Loads the payload of directory `dir` into `scratch`, returning its
    /// length.
    pub(crate) fn dir_load(
        &mut self,
        dir: InodeNumber,
        scratch: &mut [u8; FS_DIR_MAX],
    ) -> FsResult<usize> {
        if !self.inode(dir).mode.is_dir() {
            return Err(FsError::NotDirectory);
        }

        let size = self.inode(dir).size as usize;
        if size > FS_DIR_MAX {
            return Err(FsError::DirTooBig);
        }

        let read = self.ino_read(dir, &mut scratch[..size])?;
        debug_assert_eq!(read, size);

        Ok(size)
    }

    /// Looks `name` up in directory `dir`.
    pub(crate) fn dir_search(
        &mut self,
        dir: InodeNumber,
        name: &[u8],
    ) -> FsResult<Option<InodeNumber>> {
        let mut scratch = [0u8; FS_DIR_MAX];
        let size = self.dir_load(dir, &mut scratch)?;

        let mut found = None;
        for entry in DirEntries::new(&scratch[..size]) {
            let entry = entry?;
            if entry.name == name {
                found = Some(entry.ino);
                break;
            }
        }

        match found {
            Some(ino) => Ok(Some(self.check_ino(ino)?)),
            None => Ok(None),
        }
    }

    /// Appends a `name -> ino` entry to directory `dir` and takes a
    /// reference on `ino`.
    pub(crate) fn dir_link(
        &mut self,
        dir: InodeNumber,
        ino: InodeNumber,
        name: &[u8],
    ) -> FsResult<()> {
        if name.is_empty() || name.contains(&0) {
            return Err(FsError::InvalidPath);
        }
        if name.len() > FS_NAME_MAX {
            return Err(FsError::NameTooLong);
        }

        let mut scratch = [0u8; FS_DIR_MAX];
        let size = self.dir_load(dir, &mut scratch)?;

        for entry in DirEntries::new(&scratch[..size]) {
            if entry?.name == name {
                return Err(FsError::Exists);
            }
        }

        let entry_len = ENTRY_OVERHEAD + name.len();
        if size + entry_len > FS_DIR_MAX {
            return Err(FsError::DirTooBig);
        }

        let end = &mut scratch[size..size + entry_len];
        end[0..2].copy_from_slice(&u16::from(ino).to_le_bytes());
        end[2..4].copy_from_slice(&(name.len() as u16).to_le_bytes());
        end[4..4 + name.len()].copy_from_slice(name);
        end[4 + name.len()] = 0;

        self.ino_write(dir, &scratch[..size + entry_len])?;
        self.refs_inc(ino);

        Ok(())
    }

    /// Removes the `name` entry from directory `dir`, dropping the
    /// reference it held.
    ///
    /// Returns the inode the removed entry pointed at.
    pub(crate) fn dir_unlink(&mut self, dir: InodeNumber, name: &[u8]) -> FsResult<InodeNumber> {
        let mut scratch = [0u8; FS_DIR_MAX];
        let size = self.dir_load(dir, &mut scratch)?;

        let mut found = None;
        {
            let mut entries = DirEntries::new(&scratch[..size]);
            loop {
                let start = entries.offset();
                let Some(entry) = entries.next() else {
                    break;
                };
                let entry = entry?;
                if entry.name == name {
                    found = Some((start, start + entry.encoded_len(), entry.ino));
                    break;
                }
            }
        }

        let (start, end, ino) = found.ok_or(FsError::NoEntry)?;
        let ino = self.check_ino(ino)?;

        // Overlapping tail move with the destination before the source.
        scratch.copy_within(end..size, start);

        self.ino_write(dir, &scratch[..size - (end - start)])?;
        self.refs_dec(ino)?;

        Ok(ino)
    }

    /// Redirects the `..` entry of directory `dir` to `new_parent`, moving
    /// the reference it holds.
    pub(crate) fn dir_set_parent(
        &mut self,
        dir: InodeNumber,
        new_parent: InodeNumber,
    ) -> FsResult<()> {
        let mut scratch = [0u8; FS_DIR_MAX];
        let size = self.dir_load(dir, &mut scratch)?;

        let mut found = None;
        {
            let mut entries = DirEntries::new(&scratch[..size]);
            loop {
                let start = entries.offset();
                let Some(entry) = entries.next() else {
                    break;
                };
                let entry = entry?;
                if entry.name == b".." {
                    found = Some((start, entry.ino));
                    break;
                }
            }
        }

        let (start, old_parent) = found.ok_or(FsError::Corrupted)?;
        let old_parent = self.check_ino(old_parent)?;

        scratch[start..start + 2].copy_from_slice(&u16::from(new_parent).to_le_bytes());
        self.ino_write(dir, &scratch[..size])?;

        self.refs_inc(new_parent);
        self.refs_dec(old_parent)?;

        Ok(())
    }

    /// Whether directory `dir` holds no entries besides `.` and `..`.
    pub(crate) fn dir_is_empty(&mut self, dir: InodeNumber) -> FsResult<bool> {
        let mut scratch = [0u8; FS_DIR_MAX];
        let size = self.dir_load(dir, &mut scratch)?;

        for entry in DirEntries::new(&scratch[..size]) {
            let entry = entry?;
            if entry.name != b"." && entry.name != b".." {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
