//! Artifacts appended to a single data file, located through an in-memory index.
//!
//! The data file only ever grows. The index maps each key to the byte range
//! of its artifact and is persisted as a snapshot by [`StorageBackend::flush`].
//! If the process dies before flushing, the appended bytes stay in the data
//! file but are no longer discoverable; nothing rescans the data file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use kura_common::unix_seconds;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::StorageBackend;
use crate::artifact::ArtifactBytes;
use crate::error::CacheError;
use crate::key::{CacheKey, IdentityNamer, KeyNamer};

/// Magic bytes identifying a Kura index snapshot.
const INDEX_MAGIC: [u8; 4] = *b"KURA";

/// Current snapshot format version. Increment on breaking changes.
const INDEX_FORMAT_VERSION: u32 = 1;

/// Location and write time of one artifact inside the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Byte offset of the artifact in the data file.
    pub offset: u64,
    /// Length of the artifact in bytes.
    pub size: u64,
    /// Unix time at which the artifact was appended.
    pub timestamp: i64,
}

/// On-disk form of the index.
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    magic: [u8; 4],
    format_version: u32,
    entries: HashMap<String, IndexEntry>,
}

/// A write-once backend appending artifacts to one data file.
///
/// Existing keys can never be overwritten or removed; `write` on an indexed
/// key fails with [`CacheError::DuplicateKey`] and `remove`/`remove_all` are
/// unsupported.
#[derive(Debug)]
pub struct AppendLogBackend {
    index_path: PathBuf,
    data_path: PathBuf,
    data_file: File,
    index: HashMap<String, IndexEntry>,
    dirty: bool,
}

impl AppendLogBackend {
    /// Opens the backend, loading the index snapshot if one exists.
    ///
    /// Without a snapshot the index starts empty and the data file is
    /// truncated, since none of its bytes could be located anyway.
    pub fn open(
        index_path: impl Into<PathBuf>,
        data_path: impl Into<PathBuf>,
    ) -> Result<Self, CacheError> {
        let index_path = index_path.into();
        let data_path = data_path.into();

        let index = if index_path.exists() {
            let index = load_index(&index_path)?;
            debug!(entries = index.len(), path = %index_path.display(), "loaded append log index");
            index
        } else {
            File::create(&data_path).map_err(|e| CacheError::io(&data_path, e))?;
            HashMap::new()
        };

        let data_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&data_path)
            .map_err(|e| CacheError::io(&data_path, e))?;

        Ok(Self {
            index_path,
            data_path,
            data_file,
            index,
            dirty: false,
        })
    }

    /// Returns the index entry for `key`, if any.
    pub fn entry(&self, key: &CacheKey) -> Option<&IndexEntry> {
        self.index.get(key.as_str())
    }

    /// Number of indexed artifacts.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if the index has changes not yet written to the snapshot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn lookup(&self, key: &CacheKey) -> Result<IndexEntry, CacheError> {
        self.index
            .get(key.as_str())
            .copied()
            .ok_or_else(|| CacheError::Missing {
                key: key.to_string(),
            })
    }

    fn save_index(&self) -> Result<(), CacheError> {
        let snapshot = IndexSnapshot {
            magic: INDEX_MAGIC,
            format_version: INDEX_FORMAT_VERSION,
            entries: self.index.clone(),
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let tmp = self.index_path.with_extension("tmp");
        std::fs::write(&tmp, &bytes).map_err(|e| CacheError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.index_path).map_err(|e| CacheError::io(&self.index_path, e))
    }
}

/// Reads and validates an index snapshot.
fn load_index(path: &Path) -> Result<HashMap<String, IndexEntry>, CacheError> {
    let raw = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
    let (snapshot, _): (IndexSnapshot, usize) =
        bincode::serde::decode_from_slice(&raw, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: format!("corrupt index snapshot {}: {e}", path.display()),
            }
        })?;

    if snapshot.magic != INDEX_MAGIC {
        return Err(CacheError::Serialization {
            reason: format!("{} is not an index snapshot", path.display()),
        });
    }
    if snapshot.format_version != INDEX_FORMAT_VERSION {
        return Err(CacheError::Serialization {
            reason: format!(
                "index snapshot version mismatch: expected {INDEX_FORMAT_VERSION}, got {}",
                snapshot.format_version
            ),
        });
    }
    Ok(snapshot.entries)
}

impl StorageBackend for AppendLogBackend {
    fn name(&self) -> &str {
        "appendlog"
    }

    fn key_for(&self, source: &Path) -> CacheKey {
        IdentityNamer.key_for(source)
    }

    fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.index.contains_key(key.as_str()))
    }

    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime) -> Result<bool, CacheError> {
        let entry = self.lookup(key)?;
        Ok(entry.timestamp >= unix_seconds(source_mtime))
    }

    fn read(&self, key: &CacheKey) -> Result<ArtifactBytes, CacheError> {
        let entry = self.lookup(key)?;
        let mut file = &self.data_file;
        file.seek(SeekFrom::Start(entry.offset))
            .map_err(|e| CacheError::io(&self.data_path, e))?;

        // The index is untrusted input: size the buffer by what the file holds.
        let available = file
            .metadata()
            .map_err(|e| CacheError::io(&self.data_path, e))?
            .len()
            .saturating_sub(entry.offset);
        let capacity = usize::try_from(entry.size.min(available)).unwrap_or(0);
        let mut buffer = Vec::with_capacity(capacity);
        file.take(entry.size)
            .read_to_end(&mut buffer)
            .map_err(|e| CacheError::io(&self.data_path, e))?;

        if buffer.len() as u64 != entry.size {
            return Err(CacheError::ShortRead {
                key: key.to_string(),
                expected: entry.size,
                actual: buffer.len() as u64,
            });
        }
        Ok(ArtifactBytes::Owned(buffer))
    }

    fn write(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        if self.index.contains_key(key.as_str()) {
            return Err(CacheError::DuplicateKey {
                backend: self.name().to_string(),
                key: key.to_string(),
            });
        }

        let offset = self
            .data_file
            .seek(SeekFrom::End(0))
            .map_err(|e| CacheError::io(&self.data_path, e))?;
        self.data_file
            .write_all(bytes)
            .map_err(|e| CacheError::io(&self.data_path, e))?;

        self.index.insert(
            key.to_string(),
            IndexEntry {
                offset,
                size: bytes.len() as u64,
                timestamp: unix_seconds(SystemTime::now()),
            },
        );
        self.dirty = true;
        debug!(key = %key, offset, size = bytes.len(), "appended artifact");
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        // Index entries must never point past durable data.
        self.data_file
            .sync_data()
            .map_err(|e| CacheError::io(&self.data_path, e))?;
        self.save_index()?;
        self.dirty = false;
        info!(entries = self.index.len(), path = %self.index_path.display(), "append log index updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Paths {
        _dir: tempfile::TempDir,
        index: PathBuf,
        data: PathBuf,
    }

    fn paths() -> Paths {
        let dir = tempfile::tempdir().unwrap();
        Paths {
            index: dir.path().join("cb.ff_index"),
            data: dir.path().join("cb.ff_data"),
            _dir: dir,
        }
    }

    fn open(p: &Paths) -> AppendLogBackend {
        AppendLogBackend::open(&p.index, &p.data).unwrap()
    }

    #[test]
    fn fresh_open_creates_empty_data_file() {
        let p = paths();
        let backend = open(&p);
        assert!(backend.is_empty());
        assert_eq!(std::fs::metadata(&p.data).unwrap().len(), 0);
        assert!(!p.index.exists());
    }

    #[test]
    fn appends_at_increasing_offsets() {
        let p = paths();
        let mut backend = open(&p);
        let a = backend.key_for(Path::new("/a.src"));
        let b = backend.key_for(Path::new("/b.src"));
        backend.write(&a, b"first").unwrap();
        backend.write(&b, b"second!").unwrap();

        assert_eq!(backend.entry(&a).unwrap().offset, 0);
        assert_eq!(backend.entry(&a).unwrap().size, 5);
        assert_eq!(backend.entry(&b).unwrap().offset, 5);
        assert_eq!(backend.entry(&b).unwrap().size, 7);
        assert_eq!(&backend.read(&a).unwrap()[..], b"first");
        assert_eq!(&backend.read(&b).unwrap()[..], b"second!");
        assert_eq!(std::fs::metadata(&p.data).unwrap().len(), 12);
    }

    #[test]
    fn duplicate_write_rejected_and_original_kept() {
        let p = paths();
        let mut backend = open(&p);
        let key = backend.key_for(Path::new("/a.src"));
        backend.write(&key, b"original").unwrap();

        let err = backend.write(&key, b"replacement").unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(&backend.read(&key).unwrap()[..], b"original");
        assert_eq!(std::fs::metadata(&p.data).unwrap().len(), 8);
    }

    #[test]
    fn remove_and_remove_all_unsupported() {
        let p = paths();
        let mut backend = open(&p);
        let key = backend.key_for(Path::new("/a.src"));
        backend.write(&key, b"bytes").unwrap();

        assert!(backend.remove(&key).unwrap_err().is_unsupported());
        assert!(backend.remove_all().unwrap_err().is_unsupported());
        assert!(backend.exists(&key).unwrap());
    }

    #[test]
    fn freshness_uses_append_time() {
        let p = paths();
        let mut backend = open(&p);
        let key = backend.key_for(Path::new("/a.src"));
        backend.write(&key, b"bytes").unwrap();

        let now = SystemTime::now();
        assert!(backend.is_fresh(&key, now - Duration::from_secs(60)).unwrap());
        assert!(!backend.is_fresh(&key, now + Duration::from_secs(60)).unwrap());
    }

    #[test]
    fn flush_persists_index_for_reopen() {
        let p = paths();
        let key = {
            let mut backend = open(&p);
            let key = backend.key_for(Path::new("/a.src"));
            backend.write(&key, b"persisted").unwrap();
            assert!(backend.is_dirty());
            backend.flush().unwrap();
            assert!(!backend.is_dirty());
            key
        };

        let backend = open(&p);
        assert_eq!(backend.len(), 1);
        assert_eq!(&backend.read(&key).unwrap()[..], b"persisted");
    }

    #[test]
    fn clean_flush_does_not_write_snapshot() {
        let p = paths();
        let mut backend = open(&p);
        backend.flush().unwrap();
        assert!(!p.index.exists());
    }

    #[test]
    fn unflushed_entries_are_lost_but_bytes_remain() {
        let p = paths();
        {
            let mut first = open(&p);
            let a = first.key_for(Path::new("/a.src"));
            first.write(&a, b"indexed").unwrap();
            first.flush().unwrap();

            let b = first.key_for(Path::new("/b.src"));
            first.write(&b, b"orphan").unwrap();
        }

        let backend = open(&p);
        assert_eq!(backend.len(), 1);
        assert!(!backend.exists(&backend.key_for(Path::new("/b.src"))).unwrap());
        assert_eq!(std::fs::metadata(&p.data).unwrap().len(), 13);
    }

    #[test]
    fn reopened_index_appends_after_existing_data() {
        let p = paths();
        {
            let mut backend = open(&p);
            let key = backend.key_for(Path::new("/a.src"));
            backend.write(&key, b"abc").unwrap();
            backend.flush().unwrap();
        }
        let mut backend = open(&p);
        let key = backend.key_for(Path::new("/b.src"));
        backend.write(&key, b"defg").unwrap();
        assert_eq!(backend.entry(&key).unwrap().offset, 3);
        assert_eq!(&backend.read(&key).unwrap()[..], b"defg");
    }

    #[test]
    fn truncated_data_is_short_read() {
        let p = paths();
        let key = {
            let mut backend = open(&p);
            let key = backend.key_for(Path::new("/a.src"));
            backend.write(&key, b"0123456789").unwrap();
            backend.flush().unwrap();
            key
        };
        let file = OpenOptions::new().write(true).open(&p.data).unwrap();
        file.set_len(4).unwrap();

        let backend = open(&p);
        match backend.read(&key) {
            Err(CacheError::ShortRead {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 4);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_snapshot_is_serialization_error() {
        let p = paths();
        std::fs::write(&p.index, b"garbage").unwrap();
        std::fs::write(&p.data, b"kept").unwrap();

        let err = AppendLogBackend::open(&p.index, &p.data).unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
        assert_eq!(std::fs::read(&p.data).unwrap(), b"kept");
    }

    fn write_snapshot(p: &Paths, entries: HashMap<String, IndexEntry>) {
        let snapshot = IndexSnapshot {
            magic: INDEX_MAGIC,
            format_version: INDEX_FORMAT_VERSION,
            entries,
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();
        std::fs::write(&p.index, bytes).unwrap();
    }

    #[test]
    fn oversized_index_entry_is_short_read() {
        let p = paths();
        std::fs::write(&p.data, b"abcd").unwrap();
        let mut entries = HashMap::new();
        entries.insert(
            "/a.src".to_string(),
            IndexEntry {
                offset: 0,
                size: u64::MAX,
                timestamp: 0,
            },
        );
        write_snapshot(&p, entries);

        let backend = open(&p);
        let key = backend.key_for(Path::new("/a.src"));
        match backend.read(&key) {
            Err(CacheError::ShortRead {
                expected, actual, ..
            }) => {
                assert_eq!(expected, u64::MAX);
                assert_eq!(actual, 4);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[test]
    fn entry_past_end_of_data_is_short_read() {
        let p = paths();
        std::fs::write(&p.data, b"abcd").unwrap();
        let mut entries = HashMap::new();
        entries.insert(
            "/a.src".to_string(),
            IndexEntry {
                offset: 100,
                size: 8,
                timestamp: 0,
            },
        );
        write_snapshot(&p, entries);

        let backend = open(&p);
        let key = backend.key_for(Path::new("/a.src"));
        assert!(matches!(
            backend.read(&key),
            Err(CacheError::ShortRead { actual: 0, .. })
        ));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let p = paths();
        let snapshot = IndexSnapshot {
            magic: *b"BAAD",
            format_version: INDEX_FORMAT_VERSION,
            entries: HashMap::new(),
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();
        std::fs::write(&p.index, bytes).unwrap();

        let err = AppendLogBackend::open(&p.index, &p.data).unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }

    #[test]
    fn read_unknown_key_is_missing() {
        let p = paths();
        let backend = open(&p);
        let key = backend.key_for(Path::new("/nope.src"));
        assert!(matches!(backend.read(&key), Err(CacheError::Missing { .. })));
    }
}
