use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::BagError;

/// Checksum algorithms a bag can carry manifests for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    pub fn manifest_name(self) -> String {
        format!("manifest-{}.txt", self.name())
    }

    pub fn tag_manifest_name(self) -> String {
        format!("tagmanifest-{}.txt", self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(BagError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Digest a file once per algorithm in a single pass; returns the hex digests and byte count
pub fn digest_file(
    path: &Path,
    algorithms: &[ChecksumAlgorithm],
) -> std::io::Result<(Vec<String>, u64)> {
    let mut hashers: Vec<Hasher> = algorithms.iter().map(|a| Hasher::new(*a)).collect();
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        for hasher in &mut hashers {
            hasher.update(&buf[..n]);
        }
    }

    Ok((hashers.into_iter().map(Hasher::finalize_hex).collect(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_known_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();

        let (digests, size) =
            digest_file(&path, &[ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256]).unwrap();
        assert_eq!(size, 3);
        assert_eq!(digests[0], "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            digests[1],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("MD5".parse::<ChecksumAlgorithm>().unwrap(), ChecksumAlgorithm::Md5);
        assert_eq!(
            "sha256".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Sha256
        );
        assert!("crc32".parse::<ChecksumAlgorithm>().is_err());
    }

    #[test]
    fn test_manifest_names() {
        assert_eq!(ChecksumAlgorithm::Md5.manifest_name(), "manifest-md5.txt");
        assert_eq!(
            ChecksumAlgorithm::Sha256.tag_manifest_name(),
            "tagmanifest-sha256.txt"
        );
    }
}
