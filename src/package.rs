//! Unpacking exported AIP zips and serializing bags as tar files

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Zip entry escapes the destination: {0}")]
    UnsafeEntry(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PackageError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Extract an AIP zip into `dest`, returning the number of files written
pub fn unpack_aip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path).map_err(io_err(zip_path))?;
    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest).map_err(io_err(dest))?;

    let mut files = 0;
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(PackageError::UnsafeEntry(entry.name().to_string()));
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(io_err(&out))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut target = File::create(&out).map_err(io_err(&out))?;
        io::copy(&mut entry, &mut target).map_err(io_err(&out))?;
        files += 1;
    }

    debug!(zip = %zip_path.display(), files, "Unpacked AIP");
    Ok(files)
}

/// Write `bag_dir` into an uncompressed tar rooted at `bag_name/`
pub fn tar_bag(bag_dir: &Path, bag_name: &str, tar_path: &Path) -> Result<u64> {
    if let Some(parent) = tar_path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let file = File::create(tar_path).map_err(io_err(tar_path))?;
    let mut builder = tar::Builder::new(file);
    builder
        .append_dir_all(bag_name, bag_dir)
        .map_err(io_err(bag_dir))?;
    let file = builder.into_inner().map_err(io_err(tar_path))?;
    file.sync_all().map_err(io_err(tar_path))?;

    let size = fs::metadata(tar_path).map_err(io_err(tar_path))?.len();
    debug!(tar = %tar_path.display(), size, "Wrote bag tar");
    Ok(size)
}
