//! Content hashing for artifact integrity tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Algorithm name written in front of the digest of an integrity tag.
const TAG_ALGORITHM: &str = "xxh3";

/// A 128-bit content hash computed using XXH3.
///
/// The cache never verifies this value. It is handed to the compiler
/// collaborator, which embeds it into the artifact so that consumers can
/// cross-check the artifact against the source it was built from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Reads a file and hashes its contents.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let content = std::fs::read(path)?;
        Ok(Self::from_bytes(&content))
    }

    /// Formats the hash as an `"<algorithm>:<digest>"` integrity tag.
    pub fn integrity_tag(&self) -> String {
        format!("{TAG_ALGORITHM}:{self}")
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}
