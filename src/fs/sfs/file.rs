//! Byte-level inode operations: read, write, truncate and release.
//!
//! All three are visitors over the slot walk. `truncate` is the canonical
//! size-changing primitive: it compares every slot position against the old
//! and the new size and keeps, frees or allocates accordingly. `write`
//! truncates to the incoming length first, then fills the leaves; `read`
//! copies them out up to the live size.

use crate::errors::{FsError, FsResult};
use crate::time;

use super::header::{BLOCK_SIZE, MAX_FILE_SIZE};
use super::inode::{BlockId, InodeNumber};
use super::walk::{walk, Slot, SlotVisitor, Step};
use super::SfsImage;

const B: u32 = BLOCK_SIZE as u32;

/// Grows or shrinks the pointer tree of one inode.
///
/// `covered` tracks the byte extent known to be backed by allocated leaves,
/// so that an allocation failure can record a size under which every
/// allocated block stays reachable.
struct TruncateVisitor {
    old: u32,
    new: u32,
    covered: u32,
}

impl TruncateVisitor {
    fn new(old: u32, new: u32) -> Self {
        Self {
            old,
            new,
            covered: old.min(new),
        }
    }

    /// Makes sure the block behind `slot` exists, allocating a zeroed one
    /// when the old extent did not reach it yet.
    fn ensure_block(
        &mut self,
        fs: &mut SfsImage,
        slot: Slot,
        already_covered: bool,
    ) -> FsResult<()> {
        let current = fs.slot_get(slot);
        if current.is_valid() {
            return Ok(());
        }
        if already_covered {
            return Err(FsError::Corrupted);
        }

        let blk = fs.alloc_block().ok_or(FsError::NoSpace)?;
        fs.block_mut(blk).fill(0);
        fs.slot_set(slot, blk);

        Ok(())
    }
}

impl SlotVisitor for TruncateVisitor {
    fn leaf(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<Step> {
        let offset = pos * B;
        let old_in = self.old > offset;
        let new_in = self.new > offset;

        if new_in {
            self.ensure_block(fs, slot, old_in)?;
            self.covered = self.covered.max(self.new.min(offset + B));
            Ok(Step::Continue)
        } else if old_in {
            let current = fs.slot_get(slot);
            if !current.is_valid() {
                return Err(FsError::Corrupted);
            }
            fs.free_block(current);
            fs.slot_set(slot, BlockId::INVALID);
            Ok(Step::Continue)
        } else {
            Ok(Step::Stop)
        }
    }

    fn enter_indirect(
        &mut self,
        fs: &mut SfsImage,
        slot: Slot,
        pos: u32,
        _span: u32,
    ) -> FsResult<Step> {
        let offset = pos * B;
        let old_in = self.old > offset;
        let new_in = self.new > offset;

        if !old_in && !new_in {
            return Ok(Step::Stop);
        }

        // A freshly allocated pointer block starts out zeroed, which reads
        // back as all-invalid slots.
        self.ensure_block(fs, slot, old_in)?;

        Ok(Step::Continue)
    }

    fn leave_indirect(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<()> {
        if self.new <= pos * B {
            let current = fs.slot_get(slot);
            if current.is_valid() {
                fs.free_block(current);
                fs.slot_set(slot, BlockId::INVALID);
            }
        }

        Ok(())
    }
}

/// Copies the first `limit` bytes of an inode into a caller buffer.
struct ReadVisitor<'a> {
    dst: &'a mut [u8],
    limit: u32,
}

impl SlotVisitor for ReadVisitor<'_> {
    fn leaf(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<Step> {
        let offset = pos * B;
        if offset >= self.limit {
            return Ok(Step::Stop);
        }

        let blk = fs.slot_get(slot);
        if !blk.is_valid() {
            return Err(FsError::Corrupted);
        }

        let take = B.min(self.limit - offset) as usize;
        let offset = offset as usize;
        self.dst[offset..offset + take].copy_from_slice(&fs.block(blk)[..take]);

        Ok(Step::Continue)
    }

    fn enter_indirect(
        &mut self,
        _fs: &mut SfsImage,
        _slot: Slot,
        pos: u32,
        _span: u32,
    ) -> FsResult<Step> {
        if pos * B >= self.limit {
            Ok(Step::Stop)
        } else {
            Ok(Step::Continue)
        }
    }

    fn leave_indirect(&mut self, _fs: &mut SfsImage, _slot: Slot, _pos: u32) -> FsResult<()> {
        Ok(())
    }
}

/// Fills the leaves of an inode from a caller buffer.
struct WriteVisitor<'a> {
    src: &'a [u8],
}

impl SlotVisitor for WriteVisitor<'_> {
    fn leaf(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<Step> {
        let offset = pos * B;
        if offset as usize >= self.src.len() {
            return Ok(Step::Stop);
        }

        let blk = fs.slot_get(slot);
        if !blk.is_valid() {
            return Err(FsError::Corrupted);
        }

        let offset = offset as usize;
        let take = (self.src.len() - offset).min(BLOCK_SIZE);
        fs.block_mut(blk)[..take].copy_from_slice(&self.src[offset..offset + take]);

        Ok(Step::Continue)
    }

    fn enter_indirect(
        &mut self,
        _fs: &mut SfsImage,
        _slot: Slot,
        pos: u32,
        _span: u32,
    ) -> FsResult<Step> {
        if (pos * B) as usize >= self.src.len() {
            Ok(Step::Stop)
        } else {
            Ok(Step::Continue)
        }
    }

    fn leave_indirect(&mut self, _fs: &mut SfsImage, _slot: Slot, _pos: u32) -> FsResult<()> {
        Ok(())
    }
}

impl SfsImage {
    /// Resizes the pointer tree of `ino` to exactly `new_size` bytes.
    ///
    /// On allocation failure the work done so far stays in place and the
    /// size records the extent actually covered, so every allocated block
    /// remains reachable; the caller observes the error.
    pub(crate) fn ino_truncate(&mut self, ino: InodeNumber, new_size: u32) -> FsResult<()> {
        let old = self.inode(ino).size;
        if old == new_size {
            return Ok(());
        }

        let mut visitor = TruncateVisitor::new(old, new_size);
        let result = walk(self, ino, &mut visitor);

        match result {
            Ok(()) if visitor.covered >= new_size => {
                self.inode_mut(ino).size = new_size;
                Ok(())
            }
            // The tree ran out of addressable slots below `new_size`.
            Ok(()) => {
                self.inode_mut(ino).size = visitor.covered;
                Err(FsError::NoSpace)
            }
            Err(FsError::NoSpace) => {
                self.inode_mut(ino).size = visitor.covered;
                Err(FsError::NoSpace)
            }
            Err(err) => Err(err),
        }
    }

    /// Reads up to `dst.len()` bytes from the start of `ino`.
    ///
    /// Returns the number of bytes read, capped at the inode size.
    pub(crate) fn ino_read(&mut self, ino: InodeNumber, dst: &mut [u8]) -> FsResult<usize> {
        let limit = (self.inode(ino).size as usize).min(dst.len());

        let mut visitor = ReadVisitor {
            dst,
            limit: limit as u32,
        };
        walk(self, ino, &mut visitor)?;

        Ok(limit)
    }

    /// Replaces the content of `ino` with `src`, resizing the pointer tree
    /// first. Updates the modification time.
    pub(crate) fn ino_write(&mut self, ino: InodeNumber, src: &[u8]) -> FsResult<usize> {
        if src.len() as u64 > MAX_FILE_SIZE {
            return Err(FsError::NoSpace);
        }

        self.ino_truncate(ino, src.len() as u32)?;

        let mut visitor = WriteVisitor { src };
        walk(self, ino, &mut visitor)?;
        self.inode_mut(ino).time = time::now();

        Ok(src.len())
    }

    /// Adds one directory reference to `ino`.
    pub(crate) fn refs_inc(&mut self, ino: InodeNumber) {
        self.inode_mut(ino).refs += 1;
    }

    /// Drops one directory reference from `ino`.
    ///
    /// The last reference releases the inode's blocks and returns the
    /// record to the free list.
    pub(crate) fn refs_dec(&mut self, ino: InodeNumber) -> FsResult<()> {
        let refs = {
            let record = self.inode_mut(ino);
            debug_assert!(record.refs > 0);
            record.refs -= 1;
            record.refs
        };

        if refs == 0 {
            self.ino_truncate(ino, 0)?;
            self.free_inode(ino);
        }

        Ok(())
    }
}
