//! Path-level filesystem operations.
//!
//! Every operation resolves its paths first, then composes the directory,
//! inode and allocator layers. Errors from the lower layers surface
//! unchanged; partially applied work is left in place and the caller
//! observes the error.

use crate::errors::{FsError, FsResult};
use crate::time::{self, UnixTimestamp32};

use super::dir::DirEntries;
use super::header::{BLOCK_SIZE, FS_DIR_MAX, FS_NAME_MAX};
use super::inode::{FileMode, InodeNumber};
use super::SfsImage;

/// Per-file attributes as reported through `getattr`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileStat {
    /// Host-encoded type and permission bits.
    pub mode: u32,
    /// Number of directory entries naming the inode.
    pub nlink: u16,
    /// Logical size in bytes.
    pub size: u32,
    /// Owner user id.
    pub uid: u8,
    /// Owner group id.
    pub gid: u8,
    /// Last modification, seconds since the epoch.
    pub time: UnixTimestamp32,
}

/// Volume-level numbers as reported through `statfs`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VolumeStat {
    pub block_size: u32,
    pub blocks_total: u32,
    pub blocks_free: u32,
    pub blocks_avail: u32,
    pub inodes_total: u32,
    pub inodes_free: u32,
    pub inodes_avail: u32,
    /// Longest accepted entry name.
    pub name_max: u32,
}

impl SfsImage {
    /// Allocates a fresh inode and links it into `parent` under `leaf`.
    fn make_inode(
        &mut self,
        parent: InodeNumber,
        leaf: &str,
        mode: FileMode,
    ) -> FsResult<InodeNumber> {
        if leaf.len() > FS_NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        if self.dir_search(parent, leaf.as_bytes())?.is_some() {
            return Err(FsError::Exists);
        }

        let ino = self.alloc_inode().ok_or(FsError::NoInodes)?;
        {
            let record = self.inode_mut(ino);
            record.mode = mode;
            record.time = time::now();
        }

        if let Err(err) = self.dir_link(parent, ino, leaf.as_bytes()) {
            // The fresh inode owns no blocks yet; hand it straight back.
            self.free_inode(ino);
            return Err(err);
        }

        Ok(ino)
    }

    /// Creates a directory at `path` carrying the permission bits of the
    /// host-encoded `mode`.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let (parent, leaf) = self.resolve_parent(path)?;
        let ino = self.make_inode(parent, leaf, FileMode::directory((mode & 0o777) as u16))?;

        self.dir_link(ino, ino, b".")?;
        self.dir_link(ino, parent, b"..")?;

        Ok(())
    }

    /// Creates a regular file at `path` carrying the permission bits of the
    /// host-encoded `mode`.
    pub fn mknod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let (parent, leaf) = self.resolve_parent(path)?;
        self.make_inode(parent, leaf, FileMode::regular((mode & 0o777) as u16))?;

        Ok(())
    }

    /// Removes the non-directory entry at `path`.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let (parent, leaf) = self.resolve_parent(path)?;
        let ino = self
            .dir_search(parent, leaf.as_bytes())?
            .ok_or(FsError::NoEntry)?;

        if self.inode(ino).mode.is_dir() {
            return Err(FsError::IsDirectory);
        }

        self.dir_unlink(parent, leaf.as_bytes())?;

        Ok(())
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let (parent, leaf) = self.resolve_parent(path)?;
        let ino = self
            .dir_search(parent, leaf.as_bytes())?
            .ok_or(FsError::NoEntry)?;

        if !self.inode(ino).mode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if !self.dir_is_empty(ino)? {
            return Err(FsError::NotEmpty);
        }

        self.dir_unlink(parent, leaf.as_bytes())?;

        // The victim still holds its own `.` reference and the parent the
        // victim's `..`; dissolve both so the inode is released.
        self.refs_dec(ino)?;
        self.refs_dec(parent)?;

        Ok(())
    }

    /// Moves the entry at `src` to `dst`: the destination is linked first,
    /// then the source entry removed, so the inode is never orphaned.
    pub fn rename(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let (src_parent, src_leaf) = self.resolve_parent(src)?;
        let src_ino = self
            .dir_search(src_parent, src_leaf.as_bytes())?
            .ok_or(FsError::NoEntry)?;

        let (dst_parent, dst_leaf) = self.resolve_parent(dst)?;
        if let Some(existing) = self.dir_search(dst_parent, dst_leaf.as_bytes())? {
            if existing == src_ino {
                return Ok(());
            }
            return Err(FsError::Exists);
        }

        self.dir_link(dst_parent, src_ino, dst_leaf.as_bytes())?;
        self.dir_unlink(src_parent, src_leaf.as_bytes())?;

        // A directory that changed parents must point its `..` at the new
        // one.
        if self.inode(src_ino).mode.is_dir() && src_parent != dst_parent {
            self.dir_set_parent(src_ino, dst_parent)?;
        }

        Ok(())
    }

    /// Links the inode behind `oldpath` under the additional name
    /// `newpath`.
    pub fn link(&mut self, oldpath: &str, newpath: &str) -> FsResult<()> {
        let ino = self.resolve(oldpath)?;
        let (parent, leaf) = self.resolve_parent(newpath)?;

        self.dir_link(parent, ino, leaf.as_bytes())
    }

    /// Reads up to `buf.len()` bytes from the file at `path`.
    pub fn read(&mut self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        let ino = self.resolve(path)?;
        self.ino_read(ino, buf)
    }

    /// Replaces the content of the file at `path` with `data`.
    pub fn write(&mut self, path: &str, data: &[u8]) -> FsResult<usize> {
        let ino = self.resolve(path)?;
        self.ino_write(ino, data)
    }

    /// Resizes the file at `path` to `len` bytes.
    pub fn truncate(&mut self, path: &str, len: u32) -> FsResult<()> {
        let ino = self.resolve(path)?;
        self.ino_truncate(ino, len)?;
        self.inode_mut(ino).time = time::now();

        Ok(())
    }

    /// Replaces the permission bits of the entry at `path`.
    pub fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let ino = self.resolve(path)?;
        self.inode_mut(ino).mode.set_permissions((mode & 0o777) as u16);

        Ok(())
    }

    /// Replaces the owner of the entry at `path`.
    pub fn chown(&mut self, path: &str, uid: u8, gid: u8) -> FsResult<()> {
        let ino = self.resolve(path)?;
        let record = self.inode_mut(ino);
        record.uid = uid;
        record.gid = gid;

        Ok(())
    }

    /// Stores a new modification time for the entry at `path`.
    pub fn utimens(&mut self, path: &str, mtime: UnixTimestamp32) -> FsResult<()> {
        let ino = self.resolve(path)?;
        self.inode_mut(ino).time = mtime;

        Ok(())
    }

    /// Reports the attributes of the entry at `path`.
    pub fn getattr(&mut self, path: &str) -> FsResult<FileStat> {
        let ino = self.resolve(path)?;
        let record = self.inode(ino);

        Ok(FileStat {
            mode: record.mode.to_host(),
            nlink: record.refs,
            size: record.size,
            uid: record.uid,
            gid: record.gid,
            time: record.time,
        })
    }

    /// Reports the volume-level numbers from the header.
    #[must_use]
    pub fn statfs(&self) -> VolumeStat {
        let header = self.header();
        let blocks_free = u32::from(header.blocks_total - header.blocks);
        let inodes_free = u32::from(header.inodes_total - header.inodes);

        VolumeStat {
            block_size: BLOCK_SIZE as u32,
            blocks_total: u32::from(header.blocks_total),
            blocks_free,
            blocks_avail: blocks_free,
            inodes_total: u32::from(header.inodes_total),
            inodes_free,
            inodes_avail: inodes_free,
            name_max: FS_NAME_MAX as u32,
        }
    }

    /// Calls `filler` once per entry name in the directory at `path`.
    pub fn readdir(&mut self, path: &str, filler: &mut dyn FnMut(&str)) -> FsResult<()> {
        let ino = self.resolve(path)?;

        let mut scratch = [0u8; FS_DIR_MAX];
        let size = self.dir_load(ino, &mut scratch)?;

        for entry in DirEntries::new(&scratch[..size]) {
            let entry = entry?;
            if let Some(name) = entry.name_str() {
                filler(name);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fresh_image;
    use super::super::header::FS_DIR_MAX;
    use super::super::SfsImage;
    use super::*;
    use std::collections::HashMap;

    /// Counts, over the whole tree, how many directory entries point at
    /// each inode; must match every live `refs` field.
    fn reference_counts(fs: &mut SfsImage) -> HashMap<u16, u16> {
        let mut counts = HashMap::new();
        let mut stack = vec![InodeNumber::ROOT];
        let mut seen = vec![u16::from(InodeNumber::ROOT)];

        while let Some(dir) = stack.pop() {
            let mut scratch = [0u8; FS_DIR_MAX];
            let size = fs.dir_load(dir, &mut scratch).unwrap();

            let mut children = Vec::new();
            for entry in DirEntries::new(&scratch[..size]) {
                let entry = entry.unwrap();
                *counts.entry(u16::from(entry.ino)).or_insert(0) += 1;
                children.push((entry.ino, entry.name.to_vec()));
            }

            for (ino, name) in children {
                if name != b"." && name != b".." && fs.inode(ino).mode.is_dir() {
                    if !seen.contains(&u16::from(ino)) {
                        seen.push(u16::from(ino));
                        stack.push(ino);
                    }
                }
            }
        }

        counts
    }

    fn assert_reference_invariant(fs: &mut SfsImage) {
        for (ino, count) in reference_counts(fs) {
            assert_eq!(
                fs.inode(InodeNumber::from(ino)).refs,
                count,
                "refs mismatch for inode {ino}"
            );
        }
    }

    fn names_of(fs: &mut SfsImage, path: &str) -> Vec<String> {
        let mut names = Vec::new();
        fs.readdir(path, &mut |name| names.push(name.to_string()))
            .unwrap();
        names
    }

    #[test]
    fn mkdir_reports_a_directory_of_two_entries() {
        let mut fs = fresh_image();
        fs.mkdir("/a", 0o755).unwrap();

        let stat = fs.getattr("/a").unwrap();
        assert_eq!(stat.mode, 0o040_755);
        assert_eq!(stat.nlink, 2);
        // `.` at 6 bytes plus `..` at 7.
        assert_eq!(stat.size, 13);

        assert_eq!(names_of(&mut fs, "/a"), vec![".", ".."]);
        assert_reference_invariant(&mut fs);
    }

    #[test]
    fn mknod_write_read_round_trips() {
        let mut fs = fresh_image();
        fs.mknod("/f", 0o644).unwrap();
        assert_eq!(fs.write("/f", b"hello").unwrap(), 5);

        let mut buf = [0u8; 5];
        assert_eq!(fs.read("/f", &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");

        let stat = fs.getattr("/f").unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.mode, 0o100_644);
        assert_eq!(stat.nlink, 1);
    }

    #[test]
    fn big_file_accounting_via_the_surface() {
        let mut fs = fresh_image();
        let free_before = fs.statfs().blocks_free;

        fs.mknod("/big", 0o644).unwrap();
        let data: Vec<u8> = (0..5000u32).map(|byte| (byte % 251) as u8).collect();
        fs.write("/big", &data).unwrap();

        // Six direct leaves, four indirect leaves, one pointer block.
        assert_eq!(fs.statfs().blocks_free, free_before - 11);

        fs.truncate("/big", 0).unwrap();
        assert_eq!(fs.statfs().blocks_free, free_before);
        assert_eq!(fs.getattr("/big").unwrap().size, 0);
    }

    #[test]
    fn rename_moves_a_directory_across_parents() {
        let mut fs = fresh_image();
        fs.mkdir("/a", 0o755).unwrap();
        fs.mkdir("/a/b", 0o755).unwrap();

        fs.rename("/a/b", "/c").unwrap();

        assert_eq!(fs.getattr("/a/b"), Err(FsError::NoEntry));
        let stat = fs.getattr("/c").unwrap();
        assert_eq!(stat.mode & 0o170_000, 0o040_000);

        // `..` of the moved directory follows it to the new parent.
        assert_eq!(
            fs.resolve("/c/..").unwrap(),
            fs.resolve("/").unwrap()
        );
        assert_reference_invariant(&mut fs);
    }

    #[test]
    fn rename_onto_itself_is_a_no_op() {
        let mut fs = fresh_image();
        fs.mknod("/x", 0o644).unwrap();
        fs.write("/x", b"payload").unwrap();
        let before = fs.getattr("/x").unwrap();

        fs.rename("/x", "/x").unwrap();

        assert_eq!(fs.getattr("/x").unwrap(), before);
        assert_reference_invariant(&mut fs);
    }

    #[test]
    fn rename_does_not_overwrite() {
        let mut fs = fresh_image();
        fs.mknod("/x", 0o644).unwrap();
        fs.mknod("/y", 0o644).unwrap();

        assert_eq!(fs.rename("/x", "/y"), Err(FsError::Exists));
    }

    #[test]
    fn hard_links_keep_the_file_alive() {
        let mut fs = fresh_image();
        fs.mknod("/x", 0o644).unwrap();
        fs.write("/x", b"shared").unwrap();

        fs.link("/x", "/y").unwrap();
        assert_eq!(fs.getattr("/x").unwrap().nlink, 2);

        fs.unlink("/x").unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(fs.read("/y", &mut buf).unwrap(), 6);
        assert_eq!(&buf, b"shared");
        assert_eq!(fs.getattr("/y").unwrap().nlink, 1);

        let inodes_used = fs.statfs().inodes_free;
        fs.unlink("/y").unwrap();
        assert_eq!(fs.statfs().inodes_free, inodes_used + 1);
        assert_eq!(fs.getattr("/y"), Err(FsError::NoEntry));
    }

    #[test]
    fn link_collisions_are_rejected() {
        let mut fs = fresh_image();
        fs.mknod("/x", 0o644).unwrap();
        fs.mknod("/y", 0o644).unwrap();

        assert_eq!(fs.link("/x", "/y"), Err(FsError::Exists));
        assert_eq!(fs.link("/ghost", "/z"), Err(FsError::NoEntry));
    }

    #[test]
    fn rmdir_requires_an_empty_directory() {
        let mut fs = fresh_image();
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/file", 0o644).unwrap();

        assert_eq!(fs.rmdir("/a"), Err(FsError::NotEmpty));

        // The failed attempt changed nothing.
        assert_eq!(names_of(&mut fs, "/a"), vec![".", "..", "file"]);
        assert_reference_invariant(&mut fs);

        fs.unlink("/a/file").unwrap();
        fs.rmdir("/a").unwrap();
        assert_eq!(fs.getattr("/a"), Err(FsError::NoEntry));
    }

    #[test]
    fn mkdir_then_rmdir_restores_the_counters() {
        let mut fs = fresh_image();
        let before = fs.statfs();
        let root_refs = fs.getattr("/").unwrap().nlink;

        fs.mkdir("/a", 0o755).unwrap();
        fs.rmdir("/a").unwrap();

        let after = fs.statfs();
        assert_eq!(after.blocks_free, before.blocks_free);
        assert_eq!(after.inodes_free, before.inodes_free);
        assert_eq!(fs.getattr("/").unwrap().nlink, root_refs);
        assert_reference_invariant(&mut fs);
    }

    #[test]
    fn unlink_rejects_directories_and_rmdir_rejects_files() {
        let mut fs = fresh_image();
        fs.mkdir("/d", 0o755).unwrap();
        fs.mknod("/f", 0o644).unwrap();

        assert_eq!(fs.unlink("/d"), Err(FsError::IsDirectory));
        assert_eq!(fs.rmdir("/f"), Err(FsError::NotDirectory));
        assert_eq!(fs.unlink("/ghost"), Err(FsError::NoEntry));
    }

    #[test]
    fn duplicate_creation_is_rejected() {
        let mut fs = fresh_image();
        fs.mknod("/x", 0o644).unwrap();

        assert_eq!(fs.mknod("/x", 0o644), Err(FsError::Exists));
        assert_eq!(fs.mkdir("/x", 0o755), Err(FsError::Exists));
        // Creating below a file is a type error.
        assert_eq!(fs.mknod("/x/y", 0o644), Err(FsError::NotDirectory));
    }

    #[test]
    fn attribute_updates_stick() {
        let mut fs = fresh_image();
        fs.mknod("/f", 0o644).unwrap();

        fs.chmod("/f", 0o600).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().mode, 0o100_600);

        fs.chown("/f", 42, 7).unwrap();
        let stat = fs.getattr("/f").unwrap();
        assert_eq!((stat.uid, stat.gid), (42, 7));

        fs.utimens("/f", UnixTimestamp32::from(1_700_000_000)).unwrap();
        assert_eq!(
            fs.getattr("/f").unwrap().time,
            UnixTimestamp32::from(1_700_000_000)
        );
    }

    #[test]
    fn statfs_reflects_the_fresh_geometry() {
        let fs = fresh_image();
        let stat = fs.statfs();

        assert_eq!(stat.block_size, 512);
        assert_eq!(stat.blocks_total, 1983);
        assert_eq!(stat.blocks_free, 1982);
        assert_eq!(stat.inodes_total, 1024);
        assert_eq!(stat.inodes_free, 1023);
        assert_eq!(stat.name_max, 64);
    }

    #[test]
    fn readdir_lists_in_insertion_order() {
        let mut fs = fresh_image();
        fs.mkdir("/dir", 0o755).unwrap();
        fs.mknod("/dir/one", 0o644).unwrap();
        fs.mknod("/dir/two", 0o644).unwrap();

        assert_eq!(names_of(&mut fs, "/dir"), vec![".", "..", "one", "two"]);
        assert_eq!(fs.readdir("/dir/one", &mut |_| {}), Err(FsError::NotDirectory));
        assert_eq!(fs.readdir("/ghost", &mut |_| {}), Err(FsError::NoEntry));
    }

    #[test]
    fn a_deep_tree_keeps_the_reference_invariant() {
        let mut fs = fresh_image();
        fs.mkdir("/a", 0o755).unwrap();
        fs.mkdir("/a/b", 0o755).unwrap();
        fs.mkdir("/a/b/c", 0o755).unwrap();
        fs.mknod("/a/b/c/file", 0o644).unwrap();
        fs.link("/a/b/c/file", "/a/alias").unwrap();
        fs.rename("/a/b/c", "/top").unwrap();

        assert_reference_invariant(&mut fs);
        assert_eq!(fs.getattr("/top/file").unwrap().nlink, 2);
        assert_eq!(fs.getattr("/a").unwrap().nlink, 3);
    }
}
