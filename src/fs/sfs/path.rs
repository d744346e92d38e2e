//! Absolute-path handling: validation, parent/leaf splitting, resolution.
//!
//! Only absolute paths are accepted. `.` and `..` are not special-cased:
//! they resolve through the directory entries every directory carries.

use crate::errors::{FsError, FsResult};

use super::header::FS_PATH_MAX;
use super::inode::InodeNumber;
use super::SfsImage;

/// Checks the shape of an incoming path: absolute, bounded, free of NUL
/// bytes.
fn check(path: &str) -> FsResult<&str> {
    if path.len() > FS_PATH_MAX {
        return Err(FsError::NameTooLong);
    }
    if !path.starts_with('/') || path.bytes().any(|byte| byte == 0) {
        return Err(FsError::InvalidPath);
    }

    Ok(path)
}

/// Splits `path` into its parent path and leaf name.
///
/// `/x/y` gives (`/x`, `y`) and `/x` gives (`/`, `x`). The root itself has
/// no leaf, and a trailing slash leaves no leaf either; both are rejected.
pub(crate) fn split_leaf(path: &str) -> FsResult<(&str, &str)> {
    let path = check(path)?;

    let sep = path.rfind('/').ok_or(FsError::InvalidPath)?;
    let (parent, leaf) = (&path[..sep], &path[sep + 1..]);
    if leaf.is_empty() {
        return Err(FsError::InvalidPath);
    }

    Ok((if parent.is_empty() { "/" } else { parent }, leaf))
}

impl SfsImage {
    /// Resolves an absolute path to its inode, walking the directory tree
    /// one component at a time.
    pub(crate) fn resolve(&mut self, path: &str) -> FsResult<InodeNumber> {
        let path = check(path)?;

        let mut ino = InodeNumber::from(self.header().root_ino);
        for component in path.split('/').filter(|component| !component.is_empty()) {
            ino = self
                .dir_search(ino, component.as_bytes())?
                .ok_or(FsError::NoEntry)?;
        }

        Ok(ino)
    }

    /// Resolves the parent directory of `path`, returning it together with
    /// the leaf name.
    pub(crate) fn resolve_parent<'p>(
        &mut self,
        path: &'p str,
    ) -> FsResult<(InodeNumber, &'p str)> {
        let (parent, leaf) = split_leaf(path)?;
        let parent = self.resolve(parent)?;
        if !self.inode(parent).mode.is_dir() {
            return Err(FsError::NotDirectory);
        }

        Ok((parent, leaf))
    }
}
