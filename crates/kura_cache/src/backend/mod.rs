//! The storage backend contract and its implementations.
//!
//! Every backend answers the same questions about a [`CacheKey`]: does an
//! artifact exist, is it at least as new as its source, what are its bytes.
//! Backends differ in where the bytes live and in which mutations they allow.

mod append_log;
mod compress;
mod file;
mod kv;
mod null;
mod read;

use std::path::Path;
use std::time::SystemTime;

use crate::artifact::ArtifactBytes;
use crate::error::CacheError;
use crate::key::CacheKey;

pub use append_log::{AppendLogBackend, IndexEntry};
pub use compress::Compressed;
pub use file::{DirectFileBackend, FileBackend, HashedFileBackend, ARTIFACT_EXT};
pub use kv::KeyValueBackend;
pub use null::NullBackend;
pub use read::{BufferedRead, ByteReader, MappedRead};

/// A storage strategy for cached artifacts.
///
/// `is_fresh` is only meaningful for keys where `exists` returned `true`.
/// Operations a backend cannot perform fail with
/// [`CacheError::Unsupported`]; they never silently succeed.
pub trait StorageBackend {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Derives the key under which the artifact of `source` is stored.
    fn key_for(&self, source: &Path) -> CacheKey;

    /// Returns `true` if an artifact is stored under `key`.
    fn exists(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Returns `true` if the artifact's recorded timestamp is at least
    /// `source_mtime`. Equal timestamps count as fresh.
    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime) -> Result<bool, CacheError>;

    /// Reads the artifact stored under `key`.
    fn read(&self, key: &CacheKey) -> Result<ArtifactBytes, CacheError>;

    /// Stores `bytes` under `key`.
    fn write(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError>;

    /// Removes the artifact stored under `key`.
    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        let _ = key;
        Err(CacheError::unsupported(self.name(), "remove"))
    }

    /// Removes every artifact of this backend and returns how many were removed.
    fn remove_all(&mut self) -> Result<usize, CacheError> {
        Err(CacheError::unsupported(self.name(), "remove_all"))
    }

    /// Persists any state held only in memory.
    fn flush(&mut self) -> Result<(), CacheError> {
        Ok(())
    }
}
