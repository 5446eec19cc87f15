//! A backend that stores nothing.

use std::path::Path;
use std::time::SystemTime;

use super::StorageBackend;
use crate::artifact::ArtifactBytes;
use crate::error::CacheError;
use crate::key::{CacheKey, IdentityNamer, KeyNamer};

/// Disables caching: every lookup misses and every write is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl StorageBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn key_for(&self, source: &Path) -> CacheKey {
        IdentityNamer.key_for(source)
    }

    fn exists(&self, _key: &CacheKey) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn is_fresh(&self, _key: &CacheKey, _source_mtime: SystemTime) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn read(&self, key: &CacheKey) -> Result<ArtifactBytes, CacheError> {
        Err(CacheError::Missing {
            key: key.to_string(),
        })
    }

    fn write(&mut self, _key: &CacheKey, _bytes: &[u8]) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove(&mut self, _key: &CacheKey) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove_all(&mut self) -> Result<usize, CacheError> {
        Ok(0)
    }
}
