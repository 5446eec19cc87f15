//! Transparent gzip compression over another backend.

use std::io::{Read, Write};
use std::path::Path;
use std::time::SystemTime;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::StorageBackend;
use crate::artifact::ArtifactBytes;
use crate::error::CacheError;
use crate::key::CacheKey;

/// Extension appended to the inner backend's key.
const GZIP_EXT: &str = "gz";

/// Decorator gzip-compressing artifacts on write and decompressing on read.
///
/// Keys carry an extra `.gz` extension so compressed and uncompressed
/// artifacts of the same source never share a file. Existence, freshness
/// and removal go straight to the inner backend.
#[derive(Debug)]
pub struct Compressed<B> {
    inner: B,
    name: String,
    level: Compression,
}

impl<B: StorageBackend> Compressed<B> {
    /// Wraps `inner` using the default compression level.
    pub fn new(inner: B) -> Self {
        Self::with_level(inner, Compression::default())
    }

    /// Wraps `inner` using an explicit compression level.
    pub fn with_level(inner: B, level: Compression) -> Self {
        let name = format!("{}+gzip", inner.name());
        Self { inner, name, level }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: StorageBackend> StorageBackend for Compressed<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_for(&self, source: &Path) -> CacheKey {
        self.inner.key_for(source).with_extension(GZIP_EXT)
    }

    fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.inner.exists(key)
    }

    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime) -> Result<bool, CacheError> {
        self.inner.is_fresh(key, source_mtime)
    }

    fn read(&self, key: &CacheKey) -> Result<ArtifactBytes, CacheError> {
        let compressed = self.inner.read(key)?;
        let mut output = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut output)
            .map_err(|e| CacheError::io(key.to_path(), e))?;
        Ok(ArtifactBytes::Owned(output))
    }

    fn write(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(bytes)
            .map_err(|e| CacheError::io(key.to_path(), e))?;
        let compressed = encoder
            .finish()
            .map_err(|e| CacheError::io(key.to_path(), e))?;
        self.inner.write(key, &compressed)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        self.inner.remove(key)
    }

    fn remove_all(&mut self) -> Result<usize, CacheError> {
        self.inner.remove_all()
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        self.inner.flush()
    }
}
