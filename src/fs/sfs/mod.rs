//! Memory-backed POSIX-style filesystem over a single contiguous byte
//! region.
//!
//! The region is partitioned into a one-block header, an inode table and a
//! data-block region:
//!
//! ```text
//! offset 0          : header (one block)
//! offset B          : inode table (64 blocks, 16 records of 32 bytes each)
//! offset B * (1+64) : data blocks
//! ```
//!
//! Free blocks and free inodes form intrusive singly-linked lists threaded
//! through the records they guard. Access to an inode's data runs through a
//! mixed pointer tree: six direct slots, one single-indirect block and one
//! double-indirect block whose slots each name another single-indirect
//! block. A third indirection level would extend the same scheme; the
//! current format stops at two.

pub mod dir;
pub mod file;
pub mod freelist;
pub mod header;
pub mod inode;
pub mod ops;
pub mod path;
pub(crate) mod walk;

use core::mem::size_of;

use bytemuck::{from_bytes, from_bytes_mut};

use crate::errors::{FsError, FsResult, MountError};
use crate::{info, time};
use header::{Header, BLOCK_SIZE, FS_PATH_MAX, INODES_PER_BLOCK, INODE_BLOCK_COUNT, INODE_COUNT,
    INODE_SIZE, POINTERS_PER_BLOCK};
use inode::{BlockId, FileMode, InodeNumber, RawInode};

/// An in-memory filesystem image owning one contiguous byte region.
///
/// All state lives in the region itself; dropping the image loses nothing
/// that [`SfsImage::as_bytes`] has not been asked for.
pub struct SfsImage {
    region: Vec<u8>,
}

impl SfsImage {
    /// Initializes a fresh filesystem in `region`.
    ///
    /// The region is zeroed, the header written, every data block above the
    /// reserved block 0 linked onto the free list, and the root directory
    /// created with its `.` and `..` entries.
    pub fn create(mut region: Vec<u8>) -> Result<Self, MountError> {
        let blocks_all = region.len() / BLOCK_SIZE;

        if region.len() % BLOCK_SIZE != 0
            || blocks_all < 1 + INODE_BLOCK_COUNT + 2
            || blocks_all > usize::from(u16::MAX)
        {
            return Err(MountError::SizeMismatch);
        }

        region.fill(0);

        let mut fs = Self { region };
        let blocks_total = (blocks_all - 1 - INODE_BLOCK_COUNT) as u16;

        *fs.header_mut() = Header {
            blocks_all: blocks_all as u16,
            blocks_header: 1,
            blocks_inode: INODE_BLOCK_COUNT as u16,
            blocks: 0,
            blocks_total,
            inodes: 0,
            inodes_total: INODE_COUNT as u16,
            header_size: size_of::<Header>() as u16,
            inode_size: INODE_SIZE as u16,
            block_size: BLOCK_SIZE as u16,
            blockp_len: POINTERS_PER_BLOCK as u16,
            max_ino: (INODE_COUNT - 1) as u16,
            root_ino: InodeNumber::ROOT.into(),
            free_ino: 0,
            free_blk: 0,
            path_max: FS_PATH_MAX as u16,
        };

        fs.init_free_lists();
        fs.init_root().map_err(MountError::Init)?;

        info!(
            "sfs",
            "created image: {} blocks ({} data), {} inodes",
            blocks_all,
            blocks_total,
            INODE_COUNT
        );

        Ok(fs)
    }

    /// Mounts an existing image region, validating its header against the
    /// region it claims to describe.
    pub fn mount(region: Vec<u8>) -> Result<Self, MountError> {
        if region.len() < BLOCK_SIZE || region.len() % BLOCK_SIZE != 0 {
            return Err(MountError::SizeMismatch);
        }

        let fs = Self { region };
        let header = *fs.header();

        if usize::from(header.block_size) != BLOCK_SIZE
            || usize::from(header.inode_size) != INODE_SIZE
            || header.blocks_header != 1
            || usize::from(header.blocks_all) * BLOCK_SIZE != fs.region.len()
            || usize::from(header.blocks_inode) * INODES_PER_BLOCK
                != usize::from(header.inodes_total)
            || usize::from(header.blocks_total) + 1 + usize::from(header.blocks_inode)
                != usize::from(header.blocks_all)
            || usize::from(header.max_ino) + 1 != usize::from(header.inodes_total)
            || header.root_ino == 0
            || header.root_ino > header.max_ino
        {
            return Err(MountError::BadHeader);
        }

        info!(
            "sfs",
            "mounted image: {} blocks in use / {}, {} inodes in use / {}",
            header.blocks,
            header.blocks_total,
            header.inodes,
            header.inodes_total
        );

        Ok(fs)
    }

    /// Raw view of the whole region, e.g. for saving.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.region
    }

    /// Gives the raw region back to the caller.
    #[must_use]
    pub fn into_region(self) -> Vec<u8> {
        self.region
    }

    pub(crate) fn header(&self) -> &Header {
        from_bytes(&self.region[..size_of::<Header>()])
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        from_bytes_mut(&mut self.region[..size_of::<Header>()])
    }

    pub(crate) fn inode(&self, ino: InodeNumber) -> &RawInode {
        let offset = BLOCK_SIZE + usize::from(ino) * INODE_SIZE;
        from_bytes(&self.region[offset..offset + INODE_SIZE])
    }

    pub(crate) fn inode_mut(&mut self, ino: InodeNumber) -> &mut RawInode {
        let offset = BLOCK_SIZE + usize::from(ino) * INODE_SIZE;
        from_bytes_mut(&mut self.region[offset..offset + INODE_SIZE])
    }

    fn block_offset(&self, blk: BlockId) -> usize {
        BLOCK_SIZE * (1 + INODE_BLOCK_COUNT + usize::from(blk))
    }

    pub(crate) fn block(&self, blk: BlockId) -> &[u8] {
        let offset = self.block_offset(blk);
        &self.region[offset..offset + BLOCK_SIZE]
    }

    pub(crate) fn block_mut(&mut self, blk: BlockId) -> &mut [u8] {
        let offset = self.block_offset(blk);
        &mut self.region[offset..offset + BLOCK_SIZE]
    }

    /// Reads the little-endian u16 at slot `index` of a block.
    pub(crate) fn block_u16(&self, blk: BlockId, index: usize) -> u16 {
        let offset = self.block_offset(blk) + index * 2;
        u16::from_le_bytes([self.region[offset], self.region[offset + 1]])
    }

    /// Writes the little-endian u16 at slot `index` of a block.
    pub(crate) fn set_block_u16(&mut self, blk: BlockId, index: usize, value: u16) {
        let offset = self.block_offset(blk) + index * 2;
        self.region[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Validates an inode index read from the medium.
    pub(crate) fn check_ino(&self, ino: InodeNumber) -> FsResult<InodeNumber> {
        if !ino.is_valid() || u16::from(ino) > self.header().max_ino {
            return Err(FsError::Corrupted);
        }

        Ok(ino)
    }

    /// Builds the root directory on a freshly initialized region.
    fn init_root(&mut self) -> FsResult<()> {
        let root = InodeNumber::ROOT;

        {
            let record = self.inode_mut(root);
            record.ino = root;
            record.mode = FileMode::directory(0o755);
            record.time = time::now();
        }
        self.header_mut().inodes = 1;

        self.dir_link(root, root, b".")?;
        self.dir_link(root, root, b"..")?;

        Ok(())
    }

    /// Dumps the header fields and derived geometry through the logging
    /// macros.
    pub fn log_geometry(&self) {
        let header = self.header();

        info!(
            "sfs",
            "blocks: all={} header={} inode={} data={}",
            header.blocks_all,
            header.blocks_header,
            header.blocks_inode,
            header.blocks_total
        );
        info!(
            "sfs",
            "blocks in use: {} / {} ({} free)",
            header.blocks,
            header.blocks_total,
            header.blocks_total - header.blocks
        );
        info!(
            "sfs",
            "inodes in use: {} / {} ({} free)",
            header.inodes,
            header.inodes_total,
            header.inodes_total - header.inodes
        );
        info!(
            "sfs",
            "sizes: header={} B, inode={} B, block={} B, {} pointers/block",
            header.header_size,
            header.inode_size,
            header.block_size,
            header.blockp_len
        );
        info!(
            "sfs",
            "root ino {} | free heads: ino={} blk={} | max path {} B",
            header.root_ino,
            header.free_ino,
            header.free_blk,
            header.path_max
        );

        let stats = header::statistics();
        info!(
            "sfs",
            "max file extent: {} blocks / {} bytes",
            stats.max_file_blocks,
            stats.max_file_bytes
        );
    }

    /// Lists every live inode with its type, size, references and direct
    /// blocks.
    pub fn log_inodes(&self) {
        for index in 1..=self.header().max_ino {
            let ino = InodeNumber::from(index);
            let record = self.inode(ino);

            if record.ino != ino {
                continue;
            }

            info!(
                "sfs",
                "ino {} [{}, {} B, refs {}]",
                ino,
                record.mode.file_type(),
                record.size,
                record.refs
            );

            for (slot, blk) in record.block.iter().enumerate() {
                if blk.is_valid() {
                    info!("sfs", "  blk {} @ slot {}", blk, slot);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn fresh_image() -> SfsImage {
    SfsImage::create(vec![0u8; header::DISK_SIZE]).expect("image creation")
}
