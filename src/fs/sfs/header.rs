//! On-medium header and fixed filesystem geometry.
//!
//! The image is split into a one-block header, an inode table and a data
//! region of equal-sized blocks. Every constant below is part of the
//! on-medium format; changing one changes the format.

use bytemuck::{Pod, Zeroable};

/// Size in bytes of a block, the unit of allocation.
pub const BLOCK_SIZE: usize = 512;

/// Number of blocks reserved for the inode table.
pub const INODE_BLOCK_COUNT: usize = 64;

/// Size in bytes of one inode record.
pub const INODE_SIZE: usize = 32;

/// Inode records per inode-table block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// Total inode records in the table, reserved record 0 included.
pub const INODE_COUNT: usize = INODE_BLOCK_COUNT * INODES_PER_BLOCK;

/// 16-bit block pointers per pointer block.
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 2;

/// Direct block slots carried in the inode record itself.
pub const DIRECT_SLOTS: usize = 6;

/// Default image capacity in bytes (2048 blocks).
pub const DISK_SIZE: usize = 1024 * 1024;

/// Scratch bound for directory payloads, in bytes.
pub const FS_DIR_MAX: usize = 1024;

/// Longest accepted absolute path, in bytes.
pub const FS_PATH_MAX: usize = 256;

/// Longest accepted entry name, in bytes.
pub const FS_NAME_MAX: usize = 64;

/// Largest byte extent a single pointer tree addresses: six direct slots,
/// one single-indirect and one double-indirect level.
pub const MAX_FILE_SIZE: u64 =
    ((DIRECT_SLOTS + POINTERS_PER_BLOCK + POINTERS_PER_BLOCK * POINTERS_PER_BLOCK) * BLOCK_SIZE)
        as u64;

/// The filesystem header, stored in block 0.
///
/// All counters are 16-bit: block and inode indices are 16-bit identifiers
/// throughout the format. `free_ino` and `free_blk` are the heads of the
/// intrusive free lists; index 0 of each table is the invalid sentinel and
/// always points at itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Header {
    /// Total number of blocks in the image, header and inode table included.
    pub blocks_all: u16,
    /// Number of header blocks (always 1).
    pub blocks_header: u16,
    /// Number of inode-table blocks.
    pub blocks_inode: u16,
    /// Data blocks currently allocated to inodes.
    pub blocks: u16,
    /// Data blocks in the data region, reserved block 0 included.
    pub blocks_total: u16,
    /// Inode records currently allocated.
    pub inodes: u16,
    /// Inode records in the table, reserved record 0 included.
    pub inodes_total: u16,
    /// Byte size of this header.
    pub header_size: u16,
    /// Byte size of one inode record.
    pub inode_size: u16,
    /// Byte size of one block.
    pub block_size: u16,
    /// 16-bit pointers per pointer block.
    pub blockp_len: u16,
    /// Highest valid inode index.
    pub max_ino: u16,
    /// Inode index of the root directory.
    pub root_ino: u16,
    /// Head of the intrusive free-inode list.
    pub free_ino: u16,
    /// Head of the intrusive free-block list.
    pub free_blk: u16,
    /// Longest accepted absolute path, in bytes.
    pub path_max: u16,
}

const _: () = assert!(core::mem::size_of::<Header>() <= BLOCK_SIZE);

/// Derived maxima of the fixed geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryStats {
    /// 16-bit pointers per pointer block.
    pub pointers_per_block: usize,
    /// Largest number of data blocks one pointer tree addresses.
    pub max_file_blocks: usize,
    /// Largest byte extent one pointer tree addresses.
    pub max_file_bytes: u64,
}

/// Computes the derived maxima of the fixed geometry.
#[must_use]
pub fn statistics() -> GeometryStats {
    let max_file_blocks =
        DIRECT_SLOTS + POINTERS_PER_BLOCK + POINTERS_PER_BLOCK * POINTERS_PER_BLOCK;

    GeometryStats {
        pointers_per_block: POINTERS_PER_BLOCK,
        max_file_blocks,
        max_file_bytes: (max_file_blocks * BLOCK_SIZE) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fits_one_block() {
        assert_eq!(core::mem::size_of::<Header>(), 32);
        assert!(core::mem::size_of::<Header>() <= BLOCK_SIZE);
    }

    #[test]
    fn geometry_constants() {
        assert_eq!(INODES_PER_BLOCK, 16);
        assert_eq!(INODE_COUNT, 1024);
        assert_eq!(POINTERS_PER_BLOCK, 256);
        assert_eq!(DISK_SIZE / BLOCK_SIZE, 2048);
    }

    #[test]
    fn derived_statistics() {
        let stats = statistics();
        assert_eq!(stats.pointers_per_block, 256);
        assert_eq!(stats.max_file_blocks, 6 + 256 + 256 * 256);
        assert_eq!(stats.max_file_bytes, MAX_FILE_SIZE);
    }
}
