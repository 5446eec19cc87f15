//! High-level cache orchestrator.
//!
//! The `CacheManager` ties a storage backend to a compiler and applies the
//! lookup policy: an artifact is served only if it exists and is at least
//! as new as its source; otherwise the miss is either reported or, with
//! auto-compile enabled, resolved by compiling and storing the result.

use std::path::Path;

use kura_common::SourceDescriptor;
use kura_config::CacheConfig;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactBytes;
use crate::backend::StorageBackend;
use crate::compiler::Compiler;
use crate::error::CacheError;
use crate::open::open_backend;
use crate::stats::Statistics;

/// Cache front end used by clients that need compiled artifacts.
///
/// The manager exclusively owns its backend and its statistics. Call
/// [`close`](Self::close) when done so write-once backends persist their
/// index.
pub struct CacheManager {
    backend: Box<dyn StorageBackend>,
    compiler: Box<dyn Compiler>,
    auto_compile: bool,
    stats: Statistics,
}

impl CacheManager {
    /// Creates a manager over an already opened backend.
    pub fn new(
        backend: Box<dyn StorageBackend>,
        compiler: Box<dyn Compiler>,
        auto_compile: bool,
    ) -> Self {
        Self {
            backend,
            compiler,
            auto_compile,
            stats: Statistics::default(),
        }
    }

    /// Opens the backend named by `config` and applies its miss policy.
    pub fn from_config(
        config: &CacheConfig,
        compiler: Box<dyn Compiler>,
    ) -> Result<Self, CacheError> {
        let backend = open_backend(config)?;
        Ok(Self::new(backend, compiler, config.auto_compile))
    }

    /// Looks up the artifact of `source`.
    ///
    /// Returns `Ok(None)` on a miss that was not (or could not be) resolved
    /// by compiling. Backend failures propagate.
    pub fn load(&mut self, source: &SourceDescriptor) -> Result<Option<ArtifactBytes>, CacheError> {
        let key = self.backend.key_for(&source.path);

        if self.backend.exists(&key)? && self.backend.is_fresh(&key, source.mtime)? {
            let bytes = self.backend.read(&key)?;
            self.stats.loaded += 1;
            debug!(source = %source.path.display(), size = bytes.len(), "cache hit");
            return Ok(Some(bytes));
        }

        if !self.auto_compile {
            self.stats.ignored += 1;
            debug!(source = %source.path.display(), "cache miss, not compiling");
            return Ok(None);
        }

        debug!(source = %source.path.display(), "cache miss, compiling");
        let Some(bytes) = self.compile(&source.path) else {
            return Ok(None);
        };
        self.backend.write(&key, &bytes)?;
        self.stats.compiled += 1;
        Ok(Some(ArtifactBytes::Owned(bytes)))
    }

    /// Stores an artifact for `source`.
    ///
    /// With `bytes` of `None` the compiler produces them first; a compile
    /// failure is logged and yields `Ok(None)` without touching the cache.
    /// Returns the stored bytes.
    pub fn store(
        &mut self,
        source: &SourceDescriptor,
        bytes: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => match self.compile(&source.path) {
                Some(bytes) => bytes,
                None => return Ok(None),
            },
        };
        let key = self.backend.key_for(&source.path);
        self.backend.write(&key, &bytes)?;
        self.stats.compiled += 1;
        debug!(source = %source.path.display(), key = %key, size = bytes.len(), "stored artifact");
        Ok(Some(bytes))
    }

    /// Removes the cached artifact of the source at `path`.
    pub fn remove(&mut self, path: &Path) -> Result<(), CacheError> {
        let key = self.backend.key_for(path);
        self.backend.remove(&key)
    }

    /// Removes every artifact held by the backend and returns the count.
    pub fn remove_all(&mut self) -> Result<usize, CacheError> {
        let removed = self.backend.remove_all()?;
        info!(backend = self.backend.name(), removed, "cleared cache");
        Ok(removed)
    }

    /// Returns a snapshot of the lookup statistics.
    pub fn stats(&self) -> Statistics {
        self.stats
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Flushes the backend and returns the final statistics.
    pub fn close(mut self) -> Result<Statistics, CacheError> {
        self.backend.flush()?;
        info!(backend = self.backend.name(), "{}", self.stats);
        Ok(self.stats)
    }

    /// Runs the compiler, logging and swallowing its failure.
    fn compile(&self, path: &Path) -> Option<Vec<u8>> {
        match self.compiler.compile(path) {
            Ok(bytes) => Some(bytes),
            Err(source) => {
                let err = CacheError::Compile {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{err}");
                None
            }
        }
    }
}
