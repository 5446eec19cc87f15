//! Cache keys and the naming strategies that derive them from source paths.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// A backend-specific name for the artifact of one source file.
///
/// File backends use the key as a filesystem path; the key-value and
/// append-log backends use it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps a key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interprets the key as a filesystem path.
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Returns a new key with `.<ext>` appended.
    pub fn with_extension(&self, ext: &str) -> Self {
        Self(format!("{}.{ext}", self.0))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategy deriving a [`CacheKey`] from a source path.
///
/// Must be deterministic and injective: two different source paths never
/// map to the same key.
pub trait KeyNamer {
    /// Derives the key for a source path.
    fn key_for(&self, source: &Path) -> CacheKey;
}

/// Uses the source path itself as the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNamer;

impl KeyNamer for IdentityNamer {
    fn key_for(&self, source: &Path) -> CacheKey {
        CacheKey(source.to_string_lossy().into_owned())
    }
}

/// Appends `.<suffix>` to the source path, placing the artifact next to its
/// source.
#[derive(Debug, Clone)]
pub struct SuffixNamer {
    suffix: String,
}

impl SuffixNamer {
    /// Creates a namer appending `.<suffix>`.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl KeyNamer for SuffixNamer {
    fn key_for(&self, source: &Path) -> CacheKey {
        let mut name = OsString::from(source.as_os_str());
        name.push(".");
        name.push(&self.suffix);
        CacheKey(name.to_string_lossy().into_owned())
    }
}

/// Escapes the whole source path into a single file name inside a
/// dedicated directory.
///
/// Every byte outside `[A-Za-z0-9._-]` becomes `%` followed by two lowercase
/// hex digits. `%` itself is escaped, so the mapping is injective.
#[derive(Debug, Clone)]
pub struct EscapedDirNamer {
    dir: PathBuf,
    suffix: String,
}

impl EscapedDirNamer {
    /// Creates a namer placing `<escaped>.<suffix>` files inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }

    /// The directory holding every artifact named by this namer.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyNamer for EscapedDirNamer {
    fn key_for(&self, source: &Path) -> CacheKey {
        let file_name = format!("{}.{}", escape_path(source), self.suffix);
        CacheKey(self.dir.join(file_name).to_string_lossy().into_owned())
    }
}

/// Escapes a path into a string containing only `[A-Za-z0-9._%-]`.
pub fn escape_path(path: &Path) -> String {
    let bytes = path.as_os_str().as_encoded_bytes();
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02x}"));
        }
    }
    out
}
