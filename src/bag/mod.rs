//! BagIt packaging
//!
//! [`make_bag`] turns a directory into a BagIt 0.97 bag in place: the payload
//! moves under `data/`, and `bagit.txt`, `bag-info.txt`, payload manifests
//! and tag manifests are written alongside it. Extra tag files (APTrust's
//! `aptrust-info.txt`) go through [`Bag::add_tag_file`] so the tag manifests
//! stay in sync.

mod info;
mod manifest;

pub use info::{BagInfo, aptrust_info, bag_name, bagit_info};
pub use manifest::{ChecksumAlgorithm, digest_file};

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const BAGIT_TXT: &str = "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n";
const PAYLOAD_DIR: &str = "data";
const STAGING_DIR: &str = ".bag-payload";

#[derive(Debug, Error)]
pub enum BagError {
    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("No checksum algorithms requested")]
    NoAlgorithms,

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Tag file name not allowed: {0}")]
    InvalidTagFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BagError>;

/// A bag on disk
#[derive(Debug, Clone)]
pub struct Bag {
    pub path: PathBuf,
    pub algorithms: Vec<ChecksumAlgorithm>,
    pub payload_files: usize,
    pub payload_bytes: u64,
}

/// Convert `dir` into a bag in place
pub fn make_bag(dir: &Path, info: &BagInfo, algorithms: &[ChecksumAlgorithm]) -> Result<Bag> {
    if algorithms.is_empty() {
        return Err(BagError::NoAlgorithms);
    }
    if !dir.is_dir() {
        return Err(BagError::NotADirectory(dir.to_path_buf()));
    }

    move_payload(dir)?;

    let data = dir.join(PAYLOAD_DIR);
    let mut files = Vec::new();
    collect_files(&data, &mut files)?;
    files.sort();

    let mut manifests = vec![String::new(); algorithms.len()];
    let mut payload_bytes = 0u64;

    for file in &files {
        let (digests, size) = digest_file(file, algorithms)?;
        payload_bytes += size;
        let relative = bag_relative(dir, file);
        for (manifest, digest) in manifests.iter_mut().zip(digests) {
            let _ = writeln!(manifest, "{digest}  {relative}");
        }
    }

    for (algorithm, manifest) in algorithms.iter().zip(&manifests) {
        fs::write(dir.join(algorithm.manifest_name()), manifest)?;
    }

    fs::write(dir.join("bagit.txt"), BAGIT_TXT)?;
    fs::write(
        dir.join("bag-info.txt"),
        render_bag_info(info, files.len(), payload_bytes),
    )?;

    let bag = Bag {
        path: dir.to_path_buf(),
        algorithms: algorithms.to_vec(),
        payload_files: files.len(),
        payload_bytes,
    };
    bag.write_tag_manifests()?;

    debug!(
        bag = %dir.display(),
        files = bag.payload_files,
        bytes = bag.payload_bytes,
        "Bag created"
    );
    Ok(bag)
}

impl Bag {
    /// Write an additional tag file at the bag root and refresh tag manifests
    pub fn add_tag_file(&self, name: &str, contents: &str) -> Result<()> {
        let reserved = name == "bagit.txt"
            || name == "bag-info.txt"
            || name.starts_with("manifest-")
            || name.starts_with("tagmanifest-");
        if reserved || name == PAYLOAD_DIR || name.contains(['/', '\\']) || name.is_empty() {
            return Err(BagError::InvalidTagFile(name.to_string()));
        }

        fs::write(self.path.join(name), contents)?;
        self.write_tag_manifests()
    }

    /// Recompute `tagmanifest-*.txt` over every root-level tag file
    fn write_tag_manifests(&self) -> Result<()> {
        let mut tag_files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && !name.starts_with("tagmanifest-") {
                tag_files.push(entry.path());
            }
        }
        tag_files.sort();

        let mut manifests = vec![String::new(); self.algorithms.len()];
        for file in &tag_files {
            let (digests, _) = digest_file(file, &self.algorithms)?;
            let relative = bag_relative(&self.path, file);
            for (manifest, digest) in manifests.iter_mut().zip(digests) {
                let _ = writeln!(manifest, "{digest}  {relative}");
            }
        }

        for (algorithm, manifest) in self.algorithms.iter().zip(&manifests) {
            fs::write(self.path.join(algorithm.tag_manifest_name()), manifest)?;
        }
        Ok(())
    }
}

/// Move everything currently in `dir` under `dir/data`
fn move_payload(dir: &Path) -> Result<()> {
    let staging = dir.join(STAGING_DIR);
    fs::create_dir(&staging)?;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == STAGING_DIR {
            continue;
        }
        fs::rename(entry.path(), staging.join(entry.file_name()))?;
    }

    fs::rename(&staging, dir.join(PAYLOAD_DIR))?;
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Forward-slash path of `file` relative to the bag root
fn bag_relative(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn render_bag_info(info: &BagInfo, files: usize, bytes: u64) -> String {
    let mut out = String::new();
    for (key, value) in info {
        let _ = writeln!(out, "{key}: {value}");
    }
    if !info.iter().any(|(k, _)| k == "Bagging-Date") {
        let today = chrono::Local::now().format("%Y-%m-%d");
        let _ = writeln!(out, "Bagging-Date: {today}");
    }
    if !info.iter().any(|(k, _)| k == "Payload-Oxum") {
        let _ = writeln!(out, "Payload-Oxum: {bytes}.{files}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("mets.xml"), "<mets/>").unwrap();
        fs::create_dir_all(temp.path().join("bitstreams")).unwrap();
        fs::write(temp.path().join("bitstreams/a.txt"), "abc").unwrap();
        temp
    }

    fn info() -> BagInfo {
        vec![("Source-Organization".to_string(), "VT".to_string())]
    }

    #[test]
    fn test_make_bag_layout() {
        let temp = payload_dir();
        let bag = make_bag(
            temp.path(),
            &info(),
            &[ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256],
        )
        .unwrap();

        assert_eq!(bag.payload_files, 2);
        assert_eq!(bag.payload_bytes, 10);
        assert!(temp.path().join("data/mets.xml").exists());
        assert!(temp.path().join("data/bitstreams/a.txt").exists());
        assert!(!temp.path().join("mets.xml").exists());
        assert!(!temp.path().join(STAGING_DIR).exists());

        assert_eq!(
            fs::read_to_string(temp.path().join("bagit.txt")).unwrap(),
            BAGIT_TXT
        );

        let md5 = fs::read_to_string(temp.path().join("manifest-md5.txt")).unwrap();
        assert!(md5.contains("900150983cd24fb0d6963f7d28e17f72  data/bitstreams/a.txt\n"));
        assert_eq!(md5.lines().count(), 2);

        let bag_info = fs::read_to_string(temp.path().join("bag-info.txt")).unwrap();
        assert!(bag_info.starts_with("Source-Organization: VT\n"));
        assert!(bag_info.contains("Payload-Oxum: 10.2\n"));
        assert!(bag_info.contains("Bagging-Date: "));
    }

    #[test]
    fn test_tag_manifest_covers_tag_files() {
        let temp = payload_dir();
        let bag = make_bag(temp.path(), &info(), &[ChecksumAlgorithm::Sha256]).unwrap();

        bag.add_tag_file("aptrust-info.txt", "Title: T\n").unwrap();

        let tags = fs::read_to_string(temp.path().join("tagmanifest-sha256.txt")).unwrap();
        let names: Vec<&str> = tags
            .lines()
            .map(|l| l.split_once("  ").unwrap().1)
            .collect();
        assert_eq!(
            names,
            vec![
                "aptrust-info.txt",
                "bag-info.txt",
                "bagit.txt",
                "manifest-sha256.txt"
            ]
        );
    }

    #[test]
    fn test_payload_named_data_is_nested() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("data")).unwrap();
        fs::write(temp.path().join("data/x.txt"), "x").unwrap();

        make_bag(temp.path(), &info(), &[ChecksumAlgorithm::Md5]).unwrap();
        assert!(temp.path().join("data/data/x.txt").exists());
    }

    #[test]
    fn test_reserved_tag_names_rejected() {
        let temp = payload_dir();
        let bag = make_bag(temp.path(), &info(), &[ChecksumAlgorithm::Md5]).unwrap();

        for name in ["bagit.txt", "manifest-md5.txt", "tagmanifest-md5.txt", "a/b.txt", ""] {
            assert!(matches!(
                bag.add_tag_file(name, "x"),
                Err(BagError::InvalidTagFile(_))
            ));
        }
    }

    #[test]
    fn test_requires_algorithm_and_directory() {
        let temp = payload_dir();
        assert!(matches!(
            make_bag(temp.path(), &info(), &[]),
            Err(BagError::NoAlgorithms)
        ));
        assert!(matches!(
            make_bag(&temp.path().join("missing"), &info(), &[ChecksumAlgorithm::Md5]),
            Err(BagError::NotADirectory(_))
        ));
    }
}
