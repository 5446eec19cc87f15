//! Source file identity used for cache lookups.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Identity and freshness information for a source file.
///
/// The path is the identity of the source; every backend derives its cache
/// key from it. The modification time is compared against the timestamp
/// recorded for the cached artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Path of the source file.
    pub path: PathBuf,

    /// Modification time of the source file.
    pub mtime: SystemTime,
}

impl SourceDescriptor {
    /// Creates a descriptor from an explicit path and modification time.
    pub fn new(path: impl Into<PathBuf>, mtime: SystemTime) -> Self {
        Self {
            path: path.into(),
            mtime,
        }
    }

    /// Stats a source file on disk.
    ///
    /// The path is canonicalized so that the same file reached through
    /// different relative paths or symlinks maps to a single cache entry.
    pub fn stat(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = std::fs::canonicalize(path.as_ref())?;
        let mtime = std::fs::metadata(&path)?.modified()?;
        Ok(Self { path, mtime })
    }

    /// Returns the modification time as whole seconds since the Unix epoch.
    pub fn mtime_secs(&self) -> i64 {
        unix_seconds(self.mtime)
    }
}

/// Converts a [`SystemTime`] to whole seconds since the Unix epoch.
///
/// Sub-second precision is truncated toward negative infinity, so a time
/// before the epoch yields a negative value.
pub fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
            if before.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}

/// Converts whole seconds since the Unix epoch back to a [`SystemTime`].
pub fn from_unix_seconds(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}
