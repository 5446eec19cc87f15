//! Artifacts stored in an embedded key-value database.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use kura_common::unix_seconds;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use super::StorageBackend;
use crate::artifact::ArtifactBytes;
use crate::error::CacheError;
use crate::key::{CacheKey, IdentityNamer, KeyNamer};

/// The single table holding both body and date entries.
const ARTIFACTS: TableDefinition<&str, &[u8]> = TableDefinition::new("artifacts");

/// Prefix of the entry holding an artifact's bytes.
const BODY_PREFIX: &str = "body.";

/// Prefix of the entry holding an artifact's write time.
const DATE_PREFIX: &str = "date.";

/// A backend keeping artifacts in a [`redb`] database file.
///
/// Each artifact occupies two entries: `body.<path>` with the bytes and
/// `date.<path>` with the Unix time of the write. The recorded time is when
/// the artifact was cached, not the source's modification time. An artifact
/// whose date entry is missing is never fresh.
///
/// The database is opened once at construction and closed when the backend
/// is dropped. Every write commits its own transaction.
pub struct KeyValueBackend {
    db: Database,
    path: PathBuf,
}

impl KeyValueBackend {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let db = Database::create(&path).map_err(|e| store_error(&path, e))?;
        let backend = Self { db, path };

        // Create the table up front so read transactions can always open it.
        let txn = backend.db.begin_write().map_err(|e| backend.error(e))?;
        txn.open_table(ARTIFACTS).map_err(|e| backend.error(e))?;
        txn.commit().map_err(|e| backend.error(e))?;

        Ok(backend)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, e: impl Display) -> CacheError {
        store_error(&self.path, e)
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let txn = self.db.begin_read().map_err(|e| self.error(e))?;
        let table = txn.open_table(ARTIFACTS).map_err(|e| self.error(e))?;
        let value = table.get(name).map_err(|e| self.error(e))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn contains(&self, name: &str) -> Result<bool, CacheError> {
        let txn = self.db.begin_read().map_err(|e| self.error(e))?;
        let table = txn.open_table(ARTIFACTS).map_err(|e| self.error(e))?;
        let present = table.get(name).map_err(|e| self.error(e))?.is_some();
        Ok(present)
    }
}

fn store_error(path: &Path, e: impl Display) -> CacheError {
    CacheError::Store {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn body_name(key: &CacheKey) -> String {
    format!("{BODY_PREFIX}{key}")
}

fn date_name(key: &CacheKey) -> String {
    format!("{DATE_PREFIX}{key}")
}

impl StorageBackend for KeyValueBackend {
    fn name(&self) -> &str {
        "keyvalue"
    }

    fn key_for(&self, source: &Path) -> CacheKey {
        IdentityNamer.key_for(source)
    }

    fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.contains(&body_name(key))
    }

    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime) -> Result<bool, CacheError> {
        let Some(raw) = self.get(&date_name(key))? else {
            return Ok(false);
        };
        let Ok(bytes) = <[u8; 8]>::try_from(raw.as_slice()) else {
            return Ok(false);
        };
        Ok(i64::from_le_bytes(bytes) >= unix_seconds(source_mtime))
    }

    fn read(&self, key: &CacheKey) -> Result<ArtifactBytes, CacheError> {
        let name = body_name(key);
        match self.get(&name)? {
            Some(bytes) => Ok(ArtifactBytes::Owned(bytes)),
            None => Err(CacheError::Missing { key: name }),
        }
    }

    fn write(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let now = unix_seconds(SystemTime::now()).to_le_bytes();
        let body = body_name(key);
        let date = date_name(key);

        let txn = self.db.begin_write().map_err(|e| self.error(e))?;
        {
            let mut table = txn.open_table(ARTIFACTS).map_err(|e| self.error(e))?;
            table.insert(body.as_str(), bytes).map_err(|e| self.error(e))?;
            table
                .insert(date.as_str(), &now[..])
                .map_err(|e| self.error(e))?;
        }
        txn.commit().map_err(|e| self.error(e))?;
        debug!(key = %key, size = bytes.len(), "stored artifact in key-value store");
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        let txn = self.db.begin_write().map_err(|e| self.error(e))?;
        {
            let mut table = txn.open_table(ARTIFACTS).map_err(|e| self.error(e))?;
            table.remove(body_name(key).as_str()).map_err(|e| self.error(e))?;
            table.remove(date_name(key).as_str()).map_err(|e| self.error(e))?;
        }
        txn.commit().map_err(|e| self.error(e))?;
        debug!(key = %key, "removed artifact from key-value store");
        Ok(())
    }

    fn remove_all(&mut self) -> Result<usize, CacheError> {
        let txn = self.db.begin_write().map_err(|e| self.error(e))?;
        let mut artifacts = 0;
        {
            let mut table = txn.open_table(ARTIFACTS).map_err(|e| self.error(e))?;
            let mut names = Vec::new();
            for entry in table.iter().map_err(|e| self.error(e))? {
                let (name, _) = entry.map_err(|e| self.error(e))?;
                names.push(name.value().to_string());
            }
            for name in &names {
                if name.starts_with(BODY_PREFIX) {
                    artifacts += 1;
                }
                table.remove(name.as_str()).map_err(|e| self.error(e))?;
            }
        }
        txn.commit().map_err(|e| self.error(e))?;
        Ok(artifacts)
    }
}
