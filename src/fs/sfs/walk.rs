//! Ordered enumeration of an inode's block slots.
//!
//! The logical slot sequence of an inode is: the six direct slots, the
//! slots of the single-indirect block, then the slots of every
//! single-indirect block named by the double-indirect block. Read, write,
//! truncate and release are all expressed as visitors over this one
//! traversal.
//!
//! An indirect block is announced to the visitor before its first leaf
//! ([`SlotVisitor::enter_indirect`]) and again after its last
//! ([`SlotVisitor::leave_indirect`]): the enter hook is where growth
//! allocates a pointer block before descending, the leave hook is where
//! shrinking frees one after its leaves have been released. The traversal
//! is iterative, and stopping early still runs the leave hooks of the
//! levels already entered.

use crate::errors::{FsError, FsResult};

use super::header::{DIRECT_SLOTS, POINTERS_PER_BLOCK};
use super::inode::{BlockId, InodeNumber};
use super::SfsImage;

/// Flow control returned by visitor callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Stop,
}

/// Addresses one 16-bit block pointer inside the image.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Slot {
    /// `block[index]` of an inode record.
    Direct { ino: InodeNumber, index: usize },
    /// `block_p` of an inode record.
    Single { ino: InodeNumber },
    /// `block_pp` of an inode record.
    Double { ino: InodeNumber },
    /// The `index`th pointer inside pointer block `blk`.
    Entry { blk: BlockId, index: usize },
}

impl SfsImage {
    pub(crate) fn slot_get(&self, slot: Slot) -> BlockId {
        match slot {
            Slot::Direct { ino, index } => self.inode(ino).block[index],
            Slot::Single { ino } => self.inode(ino).block_p,
            Slot::Double { ino } => self.inode(ino).block_pp,
            Slot::Entry { blk, index } => BlockId::from(self.block_u16(blk, index)),
        }
    }

    pub(crate) fn slot_set(&mut self, slot: Slot, value: BlockId) {
        match slot {
            Slot::Direct { ino, index } => self.inode_mut(ino).block[index] = value,
            Slot::Single { ino } => self.inode_mut(ino).block_p = value,
            Slot::Double { ino } => self.inode_mut(ino).block_pp = value,
            Slot::Entry { blk, index } => self.set_block_u16(blk, index, value.into()),
        }
    }
}

/// Visitor over the logical slot sequence of one inode.
pub(crate) trait SlotVisitor {
    /// Called for every data-block slot; `pos` is the logical block index.
    fn leaf(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<Step>;

    /// Called before descending into an indirect slot whose subtree covers
    /// `span` leaves starting at logical index `pos`. Returning
    /// [`Step::Stop`] ends the walk without descending.
    fn enter_indirect(
        &mut self,
        fs: &mut SfsImage,
        slot: Slot,
        pos: u32,
        span: u32,
    ) -> FsResult<Step>;

    /// Called after the last visited leaf below an indirect slot.
    fn leave_indirect(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<()>;
}

/// Runs `visitor` over every slot of `ino` in logical order.
///
/// After an enter hook admits a subtree, the pointer slot it covers must
/// hold a valid block index; anything else is a corruption fault.
pub(crate) fn walk<V: SlotVisitor>(
    fs: &mut SfsImage,
    ino: InodeNumber,
    visitor: &mut V,
) -> FsResult<()> {
    let pointers = POINTERS_PER_BLOCK as u32;
    let mut done = false;

    for index in 0..DIRECT_SLOTS {
        if visitor.leaf(fs, Slot::Direct { ino, index }, index as u32)? == Step::Stop {
            return Ok(());
        }
    }

    // Single indirect: leaves 6 .. 6+P.
    let base = DIRECT_SLOTS as u32;
    if visitor.enter_indirect(fs, Slot::Single { ino }, base, pointers)? == Step::Stop {
        return Ok(());
    }
    let pblk = expect_valid(fs.slot_get(Slot::Single { ino }))?;
    for index in 0..POINTERS_PER_BLOCK {
        if visitor.leaf(fs, Slot::Entry { blk: pblk, index }, base + index as u32)? == Step::Stop {
            done = true;
            break;
        }
    }
    visitor.leave_indirect(fs, Slot::Single { ino }, base)?;
    if done {
        return Ok(());
    }

    // Double indirect: leaves 6+P .. 6+P+P*P, positions derived from (j, k).
    let base = base + pointers;
    if visitor.enter_indirect(fs, Slot::Double { ino }, base, pointers * pointers)? == Step::Stop {
        return Ok(());
    }
    let ppblk = expect_valid(fs.slot_get(Slot::Double { ino }))?;
    for j in 0..POINTERS_PER_BLOCK {
        let sub = base + j as u32 * pointers;
        let entry = Slot::Entry { blk: ppblk, index: j };

        match visitor.enter_indirect(fs, entry, sub, pointers)? {
            Step::Stop => done = true,
            Step::Continue => {
                let pj = expect_valid(fs.slot_get(entry))?;
                for k in 0..POINTERS_PER_BLOCK {
                    if visitor.leaf(fs, Slot::Entry { blk: pj, index: k }, sub + k as u32)?
                        == Step::Stop
                    {
                        done = true;
                        break;
                    }
                }
                visitor.leave_indirect(fs, entry, sub)?;
            }
        }

        if done {
            break;
        }
    }
    visitor.leave_indirect(fs, Slot::Double { ino }, base)?;

    Ok(())
}

fn expect_valid(blk: BlockId) -> FsResult<BlockId> {
    if blk.is_valid() {
        Ok(blk)
    } else {
        Err(FsError::Corrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fresh_image;
    use super::super::header::BLOCK_SIZE;
    use super::*;

    /// Records the positions of the leaves backed by a valid block.
    struct RecordingVisitor {
        positions: Vec<u32>,
    }

    impl SlotVisitor for RecordingVisitor {
        fn leaf(&mut self, fs: &mut SfsImage, slot: Slot, pos: u32) -> FsResult<Step> {
            if fs.slot_get(slot).is_valid() {
                self.positions.push(pos);
                Ok(Step::Continue)
            } else {
                Ok(Step::Stop)
            }
        }

        fn enter_indirect(
            &mut self,
            fs: &mut SfsImage,
            slot: Slot,
            _pos: u32,
            _span: u32,
        ) -> FsResult<Step> {
            if fs.slot_get(slot).is_valid() {
                Ok(Step::Continue)
            } else {
                Ok(Step::Stop)
            }
        }

        fn leave_indirect(&mut self, _fs: &mut SfsImage, _slot: Slot, _pos: u32) -> FsResult<()> {
            Ok(())
        }
    }

    fn allocated_positions(blocks: usize) -> Vec<u32> {
        let mut fs = fresh_image();
        let ino = fs.alloc_inode().unwrap();
        fs.ino_truncate(ino, (blocks * BLOCK_SIZE) as u32).unwrap();

        let mut visitor = RecordingVisitor { positions: Vec::new() };
        walk(&mut fs, ino, &mut visitor).unwrap();
        visitor.positions
    }

    #[test]
    fn positions_are_contiguous_across_direct_slots() {
        assert_eq!(allocated_positions(1), vec![0]);
        assert_eq!(allocated_positions(6), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn positions_are_contiguous_across_the_single_indirect() {
        let positions = allocated_positions(6 + 256);
        assert_eq!(positions, (0..(6 + 256) as u32).collect::<Vec<_>>());
    }

    #[test]
    fn positions_are_contiguous_into_the_double_indirect() {
        // Three leaves into the second single-indirect block below the
        // double-indirect level.
        let blocks = 6 + 256 + 256 + 3;
        let positions = allocated_positions(blocks);
        assert_eq!(positions, (0..blocks as u32).collect::<Vec<_>>());
    }
}
