//! Error types for cache operations.

use std::path::{Path, PathBuf};

/// Errors that can occur during cache operations.
///
/// A cache miss is not an error: lookups report it as `Ok(None)`. Of the
/// variants below only [`CacheError::Compile`] is recovered inside the
/// cache manager; every other variant propagates to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The active backend does not implement the requested operation.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        /// Name of the backend that rejected the operation.
        backend: String,
        /// The rejected operation.
        operation: &'static str,
    },

    /// A write-once backend already holds an artifact for this key.
    #[error("artifact for {key} already exists and the {backend} backend does not support overwrite")]
    DuplicateKey {
        /// Name of the write-once backend.
        backend: String,
        /// The key that was already present.
        key: String,
    },

    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Fewer bytes were available than the index recorded for an artifact.
    #[error("size mismatch reading {key}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// The key being read.
        key: String,
        /// Size recorded in the index.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// No artifact is stored under the key.
    #[error("no cached artifact for {key}")]
    Missing {
        /// The key that was looked up.
        key: String,
    },

    /// The key-value store reported a failure.
    #[error("key-value store error at {path}: {reason}")]
    Store {
        /// Path of the store file.
        path: PathBuf,
        /// Description of the store failure.
        reason: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The compiler collaborator failed to produce an artifact.
    #[error("failed to compile {path}: {source}")]
    Compile {
        /// The source file being compiled.
        path: PathBuf,
        /// The compiler's error.
        source: crate::compiler::CompileError,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn unsupported(backend: &str, operation: &'static str) -> Self {
        CacheError::Unsupported {
            backend: backend.to_string(),
            operation,
        }
    }

    /// Returns `true` for [`CacheError::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CacheError::Unsupported { .. })
    }

    /// Returns `true` for failures to reach stored bytes: [`CacheError::Io`],
    /// [`CacheError::ShortRead`], [`CacheError::Missing`] and
    /// [`CacheError::Store`].
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            CacheError::Io { .. }
                | CacheError::ShortRead { .. }
                | CacheError::Missing { .. }
                | CacheError::Store { .. }
        )
    }

    /// Returns `true` for [`CacheError::DuplicateKey`].
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, CacheError::DuplicateKey { .. })
    }
}
