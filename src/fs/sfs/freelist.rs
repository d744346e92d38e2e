//! O(1) allocation and release of inodes and data blocks.
//!
//! Free elements form intrusive singly-linked lists: a free block stores the
//! index of the next free block in its first two bytes, a free inode stores
//! it in its `ino` field. The lists are terminated by the invalid sentinel
//! (index 0), whose own record points at itself.
//!
//! Allocation never clears block payloads; writers do that on first use.

use bytemuck::Zeroable;

use super::inode::{BlockId, InodeNumber, RawInode};
use super::SfsImage;

impl SfsImage {
    /// Links every data block and inode above the reserved ones onto their
    /// free lists. Only meaningful on a zeroed region.
    pub(crate) fn init_free_lists(&mut self) {
        let blocks_total = usize::from(self.header().blocks_total);
        for index in 1..blocks_total {
            let next = if index + 1 < blocks_total {
                (index + 1) as u16
            } else {
                BlockId::INVALID.into()
            };
            self.set_block_u16(BlockId::from(index as u16), 0, next);
        }
        self.header_mut().free_blk = if blocks_total > 1 { 1 } else { 0 };

        let inodes_total = usize::from(self.header().inodes_total);
        for index in 2..inodes_total {
            let next = if index + 1 < inodes_total {
                (index + 1) as u16
            } else {
                InodeNumber::INVALID.into()
            };
            self.inode_mut(InodeNumber::from(index as u16)).ino = InodeNumber::from(next);
        }
        self.header_mut().free_ino = 2;
    }

    /// Pops the head of the free-block list.
    ///
    /// Returns `None` when the list is exhausted.
    pub(crate) fn alloc_block(&mut self) -> Option<BlockId> {
        let head = BlockId::from(self.header().free_blk);
        if !head.is_valid() {
            return None;
        }

        let next = self.block_u16(head, 0);
        let header = self.header_mut();
        header.free_blk = next;
        header.blocks += 1;

        Some(head)
    }

    /// Pushes `blk` back onto the free-block list.
    pub(crate) fn free_block(&mut self, blk: BlockId) {
        debug_assert!(blk.is_valid());
        debug_assert!(usize::from(blk) < usize::from(self.header().blocks_total));

        let head = self.header().free_blk;
        self.set_block_u16(blk, 0, head);

        let header = self.header_mut();
        header.free_blk = blk.into();
        header.blocks -= 1;
    }

    /// Pops the head of the free-inode list, handing out a zeroed record
    /// whose `ino` field is set back to its own index.
    pub(crate) fn alloc_inode(&mut self) -> Option<InodeNumber> {
        let head = InodeNumber::from(self.header().free_ino);
        if !head.is_valid() {
            return None;
        }

        let next = self.inode(head).ino;
        {
            let header = self.header_mut();
            header.free_ino = next.into();
            header.inodes += 1;
        }

        let record = self.inode_mut(head);
        *record = RawInode::zeroed();
        record.ino = head;

        Some(head)
    }

    /// Pushes `ino` back onto the free-inode list.
    ///
    /// The caller must already have released the inode's blocks.
    pub(crate) fn free_inode(&mut self, ino: InodeNumber) {
        debug_assert!(ino.is_valid());
        debug_assert!(u16::from(ino) <= self.header().max_ino);

        let head = self.header().free_ino;
        self.inode_mut(ino).ino = InodeNumber::from(head);

        let header = self.header_mut();
        header.free_ino = ino.into();
        header.inodes -= 1;
    }
}

#[cfg(test)]
impl SfsImage {
    /// Walks the free-block chain, counting its elements.
    pub(crate) fn free_block_chain_len(&self) -> usize {
        let mut count = 0;
        let mut head = BlockId::from(self.header().free_blk);
        while head.is_valid() {
            count += 1;
            head = BlockId::from(self.block_u16(head, 0));
        }
        count
    }

    /// Walks the free-inode chain, counting its elements.
    pub(crate) fn free_inode_chain_len(&self) -> usize {
        let mut count = 0;
        let mut head = InodeNumber::from(self.header().free_ino);
        while head.is_valid() {
            count += 1;
            head = self.inode(head).ino;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::super::fresh_image;
    use super::*;

    #[test]
    fn fresh_lists_match_the_counters() {
        let fs = fresh_image();
        let header = *fs.header();

        // Reserved index 0 is on neither list.
        assert_eq!(
            usize::from(header.blocks) + fs.free_block_chain_len(),
            usize::from(header.blocks_total) - 1
        );
        assert_eq!(
            usize::from(header.inodes) + fs.free_inode_chain_len(),
            usize::from(header.inodes_total) - 1
        );
    }

    #[test]
    fn block_allocation_is_lifo() {
        let mut fs = fresh_image();

        let first = fs.alloc_block().unwrap();
        let second = fs.alloc_block().unwrap();
        assert_ne!(first, second);

        fs.free_block(second);
        fs.free_block(first);
        assert_eq!(fs.alloc_block().unwrap(), first);
        assert_eq!(fs.alloc_block().unwrap(), second);
    }

    #[test]
    fn block_list_exhausts_to_none() {
        let mut fs = fresh_image();
        let baseline = fs.header().blocks;

        let mut taken = Vec::new();
        while let Some(blk) = fs.alloc_block() {
            taken.push(blk);
        }

        assert_eq!(
            taken.len(),
            usize::from(fs.header().blocks_total) - 1 - usize::from(baseline)
        );
        assert!(fs.alloc_block().is_none());

        for blk in taken.into_iter().rev() {
            fs.free_block(blk);
        }
        assert_eq!(fs.header().blocks, baseline);
    }

    #[test]
    fn inode_allocation_hands_out_cleared_records() {
        let mut fs = fresh_image();

        let ino = fs.alloc_inode().unwrap();
        let record = fs.inode(ino);
        assert_eq!(record.ino, ino);
        assert_eq!(record.refs, 0);
        assert_eq!(record.size, 0);
        assert!(!record.block_p.is_valid());
        assert!(!record.block_pp.is_valid());
        assert!(record.block.iter().all(|blk| !blk.is_valid()));

        let counted = fs.header().inodes;
        fs.free_inode(ino);
        assert_eq!(fs.header().inodes, counted - 1);
        assert_eq!(fs.alloc_inode().unwrap(), ino);
    }
}
