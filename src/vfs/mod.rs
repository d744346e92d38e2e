//! Userspace-filesystem adapter surface.
//!
//! Translates host-style calls (`getattr`, `mkdir`, `read`, ...) into the
//! core operations, reporting results the way a userspace filesystem host
//! expects: `0` or a byte count on success, a negative errno on failure.
//!
//! Host callback tables cannot carry state, so the mounted image lives in a
//! private module-level holder with an explicit init/teardown lifecycle:
//! [`mount_image`] installs an image, [`unmount_image`] takes it back (for
//! saving). Every call in between assumes exclusive, serial use of the
//! image; the lock only guards the holder itself.

use spin::RwLock;

use crate::errors::{CanFail, FsError, FsResult, ENAMETOOLONG};
use crate::fs::sfs::ops::{FileStat, VolumeStat};
use crate::fs::sfs::SfsImage;
use crate::time::UnixTimestamp32;

static MOUNTED: RwLock<Option<SfsImage>> = RwLock::new(None);

/// Installs `image` behind the adapter surface, returning the image that
/// was mounted before, if any.
pub fn mount_image(image: SfsImage) -> Option<SfsImage> {
    MOUNTED.write().replace(image)
}

/// Removes the mounted image from the adapter surface.
pub fn unmount_image() -> Option<SfsImage> {
    MOUNTED.write().take()
}

fn with_image<T>(op: impl FnOnce(&mut SfsImage) -> FsResult<T>) -> FsResult<T> {
    let mut guard = MOUNTED.write();
    let fs = guard.as_mut().ok_or(FsError::NotMounted)?;
    op(fs)
}

fn status(result: CanFail<FsError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => -err.errno(),
    }
}

fn count(result: FsResult<usize>) -> i32 {
    match result {
        Ok(transferred) => transferred as i32,
        Err(err) => -err.errno(),
    }
}

pub fn getattr(path: &str, st: &mut FileStat) -> i32 {
    status(with_image(|fs| {
        *st = fs.getattr(path)?;
        Ok(())
    }))
}

/// Symbolic-link payloads are not stored; the call is a stub.
pub fn readlink(_path: &str, _buf: &mut [u8]) -> i32 {
    -ENAMETOOLONG
}

pub fn mknod(path: &str, mode: u32) -> i32 {
    status(with_image(|fs| fs.mknod(path, mode)))
}

pub fn mkdir(path: &str, mode: u32) -> i32 {
    status(with_image(|fs| fs.mkdir(path, mode)))
}

pub fn unlink(path: &str) -> i32 {
    status(with_image(|fs| fs.unlink(path)))
}

pub fn rmdir(path: &str) -> i32 {
    status(with_image(|fs| fs.rmdir(path)))
}

pub fn rename(src: &str, dst: &str) -> i32 {
    status(with_image(|fs| fs.rename(src, dst)))
}

pub fn link(oldpath: &str, newpath: &str) -> i32 {
    status(with_image(|fs| fs.link(oldpath, newpath)))
}

pub fn chmod(path: &str, mode: u32) -> i32 {
    status(with_image(|fs| fs.chmod(path, mode)))
}

/// Owner ids are 8-bit on-medium; wider host ids are truncated.
pub fn chown(path: &str, uid: u32, gid: u32) -> i32 {
    status(with_image(|fs| fs.chown(path, uid as u8, gid as u8)))
}

pub fn truncate(path: &str, len: u32) -> i32 {
    status(with_image(|fs| fs.truncate(path, len)))
}

/// Reads from the start of the file; `offset` is part of the host call
/// surface but the content is addressed whole-file.
pub fn read(path: &str, buf: &mut [u8], _offset: u64) -> i32 {
    count(with_image(|fs| fs.read(path, buf)))
}

/// Replaces the whole file content; `offset` is part of the host call
/// surface but the content is addressed whole-file.
pub fn write(path: &str, data: &[u8], _offset: u64) -> i32 {
    count(with_image(|fs| fs.write(path, data)))
}

pub fn statfs(_path: &str, out: &mut VolumeStat) -> i32 {
    status(with_image(|fs| {
        *out = fs.statfs();
        Ok(())
    }))
}

pub fn readdir(path: &str, filler: &mut dyn FnMut(&str)) -> i32 {
    status(with_image(|fs| fs.readdir(path, filler)))
}

/// Stores the mtime slot; the atime slot is accepted and dropped, the
/// medium only keeps a modification time.
pub fn utimens(path: &str, _atime: u32, mtime: u32) -> i32 {
    status(with_image(|fs| {
        fs.utimens(path, UnixTimestamp32::from(mtime))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{EEXIST, EIO, ENOENT, ENOTDIR, ENOTEMPTY};
    use crate::fs::sfs::header::DISK_SIZE;

    // One sequential test: the holder is shared process state, and the
    // surface is specified for serial use.
    #[test]
    fn adapter_surface_round_trip() {
        assert!(unmount_image().is_none());

        // Every call degrades to -EIO while nothing is mounted.
        let mut stat = FileStat::default();
        assert_eq!(getattr("/", &mut stat), -EIO);
        assert_eq!(mkdir("/a", 0o755), -EIO);

        let image = SfsImage::create(vec![0u8; DISK_SIZE]).unwrap();
        assert!(mount_image(image).is_none());

        assert_eq!(mkdir("/docs", 0o755), 0);
        assert_eq!(mkdir("/docs", 0o755), -EEXIST);
        assert_eq!(mknod("/docs/a.txt", 0o644), 0);

        assert_eq!(write("/docs/a.txt", b"adapter payload", 0), 15);
        let mut buf = [0u8; 32];
        assert_eq!(read("/docs/a.txt", &mut buf, 0), 15);
        assert_eq!(&buf[..15], b"adapter payload");

        assert_eq!(getattr("/docs/a.txt", &mut stat), 0);
        assert_eq!(stat.size, 15);
        assert_eq!(stat.mode, 0o100_644);

        assert_eq!(chmod("/docs/a.txt", 0o600), 0);
        assert_eq!(chown("/docs/a.txt", 1000, 1000), 0);
        assert_eq!(utimens("/docs/a.txt", 1, 2), 0);
        assert_eq!(getattr("/docs/a.txt", &mut stat), 0);
        assert_eq!(stat.mode, 0o100_600);
        assert_eq!(u32::from(stat.time), 2);

        assert_eq!(link("/docs/a.txt", "/alias"), 0);
        assert_eq!(rename("/docs/a.txt", "/b.txt"), 0);
        assert_eq!(getattr("/docs/a.txt", &mut stat), -ENOENT);

        let mut names = Vec::new();
        assert_eq!(
            readdir("/", &mut |name| names.push(name.to_string())),
            0
        );
        assert_eq!(names, vec![".", "..", "docs", "alias", "b.txt"]);

        assert_eq!(mknod("/docs/keep", 0o644), 0);
        assert_eq!(rmdir("/docs"), -ENOTEMPTY);
        assert_eq!(unlink("/docs/keep"), 0);
        assert_eq!(rmdir("/docs"), 0);
        assert_eq!(rmdir("/alias"), -ENOTDIR);

        let mut vstat = VolumeStat::default();
        assert_eq!(statfs("/", &mut vstat), 0);
        assert_eq!(vstat.block_size, 512);
        assert!(vstat.blocks_free < vstat.blocks_total);

        let mut linkbuf = [0u8; 8];
        assert_eq!(readlink("/alias", &mut linkbuf), -ENAMETOOLONG);

        assert_eq!(truncate("/b.txt", 4), 0);
        assert_eq!(unlink("/alias"), 0);
        assert_eq!(unlink("/b.txt"), 0);

        let image = unmount_image().unwrap();
        assert_eq!(getattr("/", &mut stat), -EIO);
        drop(image);
    }
}
