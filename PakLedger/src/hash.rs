//! Content hashing for pakfiles
//!
//! Digests are streamed in fixed-size reads so multi-gigabyte archives never
//! sit in memory, and are rendered as lowercase hex the way `sha256sum` and
//! `md5sum` print them.

use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{Error, Result};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithm used for a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Md5,
}

impl DigestAlgorithm {
    /// Name used for ledger file extensions and config values.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }

    /// Length of the hex rendering.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Md5 => 32,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "md5" => Ok(Self::Md5),
            _ => Err(Error::UnknownValue {
                kind: "digest algorithm",
                value: s.to_string(),
            }),
        }
    }
}

/// Lowercase hex content digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Validate a hex digest read from a ledger.
    pub fn from_hex(hex: &str, algorithm: DigestAlgorithm) -> Option<Self> {
        (hex.len() == algorithm.hex_len() && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| Self(hex.to_ascii_lowercase()))
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Streaming file hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    algorithm: DigestAlgorithm,
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Hash a file's contents. Symlinks are followed.
    pub fn hash_file(&self, path: &Path) -> Result<ContentDigest> {
        let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
        self.hash_reader(file).map_err(|e| Error::io_at(path, e))
    }

    /// Hash everything a reader yields.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> std::io::Result<ContentDigest> {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        match self.algorithm {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = reader.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                Ok(ContentDigest::from_bytes(&hasher.finalize()))
            }
            DigestAlgorithm::Md5 => {
                let mut hasher = md5::Context::new();
                loop {
                    let n = reader.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.consume(&buffer[..n]);
                }
                Ok(ContentDigest::from_bytes(&hasher.compute().0))
            }
        }
    }

    pub fn hash_bytes(&self, data: &[u8]) -> ContentDigest {
        match self.algorithm {
            DigestAlgorithm::Sha256 => ContentDigest::from_bytes(&Sha256::digest(data)),
            DigestAlgorithm::Md5 => ContentDigest::from_bytes(&md5::compute(data).0),
        }
    }
}
