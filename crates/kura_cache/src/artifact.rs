//! Artifact bytes returned by cache reads.

use std::fmt;
use std::ops::Deref;

use memmap2::Mmap;

/// The bytes of a cached artifact.
///
/// Most backends copy the artifact into an owned buffer. File backends
/// configured for memory-mapped reads return a read-only map of the cache
/// file instead, which the operating system pages in lazily. Both variants
/// dereference to `[u8]`.
pub enum ArtifactBytes {
    /// Bytes copied into memory.
    Owned(Vec<u8>),
    /// A read-only memory map of the cache file.
    Mapped(Mmap),
}

impl ArtifactBytes {
    /// Returns `true` if the bytes are served from a memory map.
    pub fn is_mapped(&self) -> bool {
        matches!(self, ArtifactBytes::Mapped(_))
    }

    /// Converts into an owned buffer, copying if the bytes are mapped.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            ArtifactBytes::Owned(bytes) => bytes,
            ArtifactBytes::Mapped(map) => map.to_vec(),
        }
    }
}

impl Deref for ArtifactBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ArtifactBytes::Owned(bytes) => bytes.as_slice(),
            ArtifactBytes::Mapped(map) => &map[..],
        }
    }
}

impl AsRef<[u8]> for ArtifactBytes {
    fn as_ref(&self) -> &[u8] {
        &self[..]
    }
}

impl From<Vec<u8>> for ArtifactBytes {
    fn from(bytes: Vec<u8>) -> Self {
        ArtifactBytes::Owned(bytes)
    }
}

impl fmt::Debug for ArtifactBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_mapped() { "Mapped" } else { "Owned" };
        write!(f, "ArtifactBytes::{kind}({} bytes)", self.len())
    }
}
