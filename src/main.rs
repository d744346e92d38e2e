use std::path::Path;
use std::process::ExitCode;

use sfs::errors::{FsResult, MountError};
use sfs::fs::sfs::header::DISK_SIZE;
use sfs::fs::sfs::SfsImage;
use sfs::{error, image, info, vfs};

const DISK_PATH: &str = "./disk";

/// Mounts the image found at `path`, or creates and pre-populates a fresh
/// one when no usable image is there.
fn prepare_image(path: &Path) -> Result<SfsImage, MountError> {
    match image::load(path, DISK_SIZE) {
        Ok(Some(region)) => SfsImage::mount(region),
        Ok(None) => {
            info!("sfs", "no usable image at {}, creating a fresh one", DISK_PATH);
            let fs = SfsImage::create(vec![0u8; DISK_SIZE])?;
            populate(fs)
        }
        Err(err) => {
            error!("sfs", "cannot read {}: {}", DISK_PATH, err);
            Err(MountError::IOError)
        }
    }
}

/// Seeds a fresh image with a small demo tree.
fn populate(mut fs: SfsImage) -> Result<SfsImage, MountError> {
    let result = (|| -> FsResult<()> {
        fs.mkdir("/docs", 0o755)?;
        fs.mkdir("/docs/notes", 0o755)?;
        fs.mkdir("/tmp", 0o777)?;

        fs.mknod("/hello.txt", 0o644)?;
        fs.write("/hello.txt", b"Hello world! :)\n")?;

        // Long enough to spill past the direct block slots.
        fs.mknod("/docs/banner.txt", 0o644)?;
        let banner = "sfs ".repeat(1024) + ":)\n";
        fs.write("/docs/banner.txt", banner.as_bytes())?;

        Ok(())
    })();

    match result {
        Ok(()) => Ok(fs),
        Err(err) => Err(MountError::Init(err)),
    }
}

fn main() -> ExitCode {
    let path = Path::new(DISK_PATH);

    let fs = match prepare_image(path) {
        Ok(fs) => fs,
        Err(err) => {
            error!("sfs", "no filesystem available: {:?}", err);
            return ExitCode::FAILURE;
        }
    };

    fs.log_geometry();
    fs.log_inodes();

    // Host-mount options would be forwarded from here; the callback surface
    // they would dispatch into lives in `vfs`.
    let _mount_args: Vec<String> = std::env::args().skip(1).collect();
    vfs::mount_image(fs);

    let Some(fs) = vfs::unmount_image() else {
        error!("sfs", "image disappeared behind the adapter surface");
        return ExitCode::FAILURE;
    };

    match image::save(path, fs.as_bytes()) {
        Ok(()) => {
            info!("sfs", "saved image to {}", DISK_PATH);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("sfs", "cannot write {}: {}", DISK_PATH, err);
            ExitCode::FAILURE
        }
    }
}
