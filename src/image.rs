//! Host-file persistence of the raw image region.
//!
//! The on-medium format is a byte-for-byte dump of the in-memory region, so
//! load and save are plain buffered file transfers.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Reads an image region of `capacity` bytes from `path`.
///
/// Returns `None` when the file is missing or shorter than `capacity`, in
/// which case the caller is expected to create a fresh image instead.
pub fn load(path: &Path, capacity: usize) -> io::Result<Option<Vec<u8>>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut region = Vec::with_capacity(capacity);
    BufReader::new(file)
        .take(capacity as u64)
        .read_to_end(&mut region)?;

    if region.len() < capacity {
        return Ok(None);
    }

    Ok(Some(region))
}

/// Writes the full image region to `path`, replacing any previous content.
pub fn save(path: &Path, region: &[u8]) -> io::Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let mut writer = BufWriter::new(file);
    writer.write_all(region)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::sfs::header::DISK_SIZE;
    use crate::fs::sfs::SfsImage;

    #[test]
    fn a_saved_filesystem_survives_reload() {
        let path = std::env::temp_dir().join("sfs_filesystem_reload.img");

        let mut fs = SfsImage::create(vec![0u8; DISK_SIZE]).unwrap();
        fs.mkdir("/kept", 0o755).unwrap();
        fs.mknod("/kept/data", 0o644).unwrap();
        fs.write("/kept/data", b"persisted bytes").unwrap();

        save(&path, fs.as_bytes()).unwrap();

        let region = load(&path, DISK_SIZE).unwrap().unwrap();
        let mut fs = SfsImage::mount(region).unwrap();

        let mut buf = [0u8; 32];
        assert_eq!(fs.read("/kept/data", &mut buf).unwrap(), 15);
        assert_eq!(&buf[..15], b"persisted bytes");
        assert_eq!(fs.getattr("/kept").unwrap().nlink, 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn image_region_round_trip() {
        let path = std::env::temp_dir().join("sfs_image_round_trip.img");
        let region: Vec<u8> = (0..4096u32).map(|b| (b % 251) as u8).collect();

        save(&path, &region).unwrap();
        let loaded = load(&path, region.len()).unwrap().unwrap();
        assert_eq!(loaded, region);

        // A capacity the file cannot fill reports a short file.
        assert!(load(&path, region.len() + 1).unwrap().is_none());

        std::fs::remove_file(&path).unwrap();
        assert!(load(&path, region.len()).unwrap().is_none());
    }
}
