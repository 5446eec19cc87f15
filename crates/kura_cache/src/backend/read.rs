//! Strategies for reading artifact files.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use crate::artifact::ArtifactBytes;

/// Strategy turning a cache file into [`ArtifactBytes`].
pub trait ByteReader {
    /// Reads the whole file at `path`.
    fn read_file(&self, path: &Path) -> io::Result<ArtifactBytes>;
}

/// Copies the file into an owned buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferedRead;

impl ByteReader for BufferedRead {
    fn read_file(&self, path: &Path) -> io::Result<ArtifactBytes> {
        std::fs::read(path).map(ArtifactBytes::Owned)
    }
}

/// Maps the file read-only into memory.
///
/// The map stays valid only as long as no other process truncates the file.
/// File backends replace artifacts by renaming a new file over the old one,
/// which leaves existing maps pointing at the old, unlinked inode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappedRead;

impl ByteReader for MappedRead {
    fn read_file(&self, path: &Path) -> io::Result<ArtifactBytes> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(ArtifactBytes::Owned(Vec::new()));
        }
        // SAFETY: artifacts are never modified in place (see above), so the
        // mapped bytes cannot change underneath the caller.
        let map = unsafe { Mmap::map(&file)? };
        Ok(ArtifactBytes::Mapped(map))
    }
}
