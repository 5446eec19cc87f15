//! One cache file per source artifact.
//!
//! [`DirectFileBackend`] places `<source>.kbin` next to each source file.
//! [`HashedFileBackend`] escapes the source path into a single file name
//! inside a dedicated directory, which also makes bulk removal possible.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

use super::read::{BufferedRead, ByteReader};
use super::StorageBackend;
use crate::artifact::ArtifactBytes;
use crate::error::CacheError;
use crate::key::{CacheKey, EscapedDirNamer, KeyNamer, SuffixNamer};

/// File extension of cached artifacts.
pub const ARTIFACT_EXT: &str = "kbin";

/// Artifacts stored next to their sources.
pub type DirectFileBackend<R = BufferedRead> = FileBackend<SuffixNamer, R>;

/// Artifacts stored under escaped names in a dedicated directory.
pub type HashedFileBackend<R = BufferedRead> = FileBackend<EscapedDirNamer, R>;

/// A backend storing each artifact as its own file.
///
/// The naming strategy `N` decides where the file lives and the read
/// strategy `R` decides how it is loaded. Freshness compares the cache
/// file's modification time with the source's. Writes land in a temporary
/// sibling first and are renamed into place, so a reader sees either the
/// old artifact or the new one.
#[derive(Debug)]
pub struct FileBackend<N, R = BufferedRead> {
    name: &'static str,
    namer: N,
    reader: R,
    /// Directory scanned by `remove_all`; `None` when artifacts are scattered.
    scan_dir: Option<PathBuf>,
}

impl FileBackend<SuffixNamer> {
    /// Creates a backend storing `<source>.kbin` next to each source.
    pub fn direct() -> Self {
        Self {
            name: "direct",
            namer: SuffixNamer::new(ARTIFACT_EXT),
            reader: BufferedRead,
            scan_dir: None,
        }
    }
}

impl FileBackend<EscapedDirNamer> {
    /// Creates a backend storing artifacts inside `dir`, creating it if needed.
    pub fn hashed(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        Ok(Self {
            name: "hashed",
            namer: EscapedDirNamer::new(dir.clone(), ARTIFACT_EXT),
            reader: BufferedRead,
            scan_dir: Some(dir),
        })
    }
}

impl<N, R> FileBackend<N, R> {
    /// Replaces the read strategy, e.g. with [`MappedRead`](super::MappedRead).
    pub fn with_reader<R2: ByteReader>(self, reader: R2) -> FileBackend<N, R2> {
        FileBackend {
            name: self.name,
            namer: self.namer,
            reader,
            scan_dir: self.scan_dir,
        }
    }
}

impl<N: KeyNamer, R: ByteReader> StorageBackend for FileBackend<N, R> {
    fn name(&self) -> &str {
        self.name
    }

    fn key_for(&self, source: &Path) -> CacheKey {
        self.namer.key_for(source)
    }

    fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(key.to_path().is_file())
    }

    fn is_fresh(&self, key: &CacheKey, source_mtime: SystemTime) -> Result<bool, CacheError> {
        let path = key.to_path();
        let cached = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| CacheError::io(&path, e))?;
        Ok(cached >= source_mtime)
    }

    fn read(&self, key: &CacheKey) -> Result<ArtifactBytes, CacheError> {
        let path = key.to_path();
        self.reader
            .read_file(&path)
            .map_err(|e| CacheError::io(&path, e))
    }

    fn write(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let path = key.to_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        write_replacing(&path, bytes).map_err(|e| CacheError::io(&path, e))?;
        debug!(path = %path.display(), size = bytes.len(), "wrote artifact file");
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), CacheError> {
        let path = key.to_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed artifact file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    fn remove_all(&mut self) -> Result<usize, CacheError> {
        let Some(dir) = self.scan_dir.as_deref() else {
            return Err(CacheError::unsupported(self.name, "remove_all"));
        };
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                CacheError::io(path, io::Error::from(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if has_artifact_suffix(&entry.file_name().to_string_lossy()) {
                std::fs::remove_file(entry.path()).map_err(|e| CacheError::io(entry.path(), e))?;
                debug!(path = %entry.path().display(), "removed artifact file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Returns `true` for `*.kbin` files and decorated variants such as `*.kbin.gz`.
fn has_artifact_suffix(file_name: &str) -> bool {
    let marker = format!(".{ARTIFACT_EXT}");
    file_name.ends_with(&marker) || file_name.contains(&format!("{marker}."))
}

/// Writes `bytes` to a temporary sibling of `path`, then renames it over `path`.
fn write_replacing(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.file_name().map(OsString::from).unwrap_or_default();
    tmp_name.push(format!(".tmp{}", std::process::id()));
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MappedRead;
    use std::time::Duration;

    fn source_in(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "source text").unwrap();
        path
    }

    #[test]
    fn direct_key_is_next_to_source() {
        let backend = FileBackend::direct();
        let key = backend.key_for(Path::new("/src/a.src"));
        assert_eq!(key.to_path(), PathBuf::from("/src/a.src.kbin"));
    }

    #[test]
    fn direct_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path(), "a.src");
        let mut backend = FileBackend::direct();
        let key = backend.key_for(&src);

        assert!(!backend.exists(&key).unwrap());
        backend.write(&key, b"compiled").unwrap();
        assert!(backend.exists(&key).unwrap());
        assert!(dir.path().join("a.src.kbin").is_file());
        assert_eq!(&backend.read(&key).unwrap()[..], b"compiled");
    }

    #[test]
    fn write_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path(), "a.src");
        let mut backend = FileBackend::direct();
        let key = backend.key_for(&src);
        backend.write(&key, b"one").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {names:?}");
    }

    #[test]
    fn overwrite_replaces_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path(), "a.src");
        let mut backend = FileBackend::direct();
        let key = backend.key_for(&src);
        backend.write(&key, b"first").unwrap();
        backend.write(&key, b"second").unwrap();
        assert_eq!(&backend.read(&key).unwrap()[..], b"second");
    }

    #[test]
    fn freshness_compares_mtimes() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path(), "a.src");
        let mut backend = FileBackend::direct();
        let key = backend.key_for(&src);
        backend.write(&key, b"bytes").unwrap();

        let cached = std::fs::metadata(key.to_path()).unwrap().modified().unwrap();
        assert!(backend.is_fresh(&key, cached).unwrap(), "ties are fresh");
        assert!(backend.is_fresh(&key, cached - Duration::from_secs(10)).unwrap());
        assert!(!backend.is_fresh(&key, cached + Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn read_missing_is_io_error() {
        let backend = FileBackend::direct();
        let key = backend.key_for(Path::new("/nonexistent/kura/a.src"));
        assert!(matches!(backend.read(&key), Err(CacheError::Io { .. })));
    }

    #[test]
    fn remove_deletes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let src = source_in(dir.path(), "a.src");
        let mut backend = FileBackend::direct();
        let key = backend.key_for(&src);
        backend.write(&key, b"bytes").unwrap();

        backend.remove(&key).unwrap();
        assert!(!backend.exists(&key).unwrap());
        backend.remove(&key).unwrap();
    }

    #[test]
    fn direct_remove_all_is_unsupported() {
        let mut backend = FileBackend::direct();
        let err = backend.remove_all().unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn hashed_creates_directory_and_escapes_names() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("cb.files");
        let mut backend = FileBackend::hashed(&files).unwrap();
        assert!(files.is_dir());

        let key = backend.key_for(Path::new("/src/lib/a.src"));
        assert_eq!(key.to_path(), files.join("%2fsrc%2flib%2fa.src.kbin"));
        backend.write(&key, b"bytes").unwrap();
        assert_eq!(&backend.read(&key).unwrap()[..], b"bytes");
    }

    #[test]
    fn hashed_remove_all_removes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("cb.files");
        let mut backend = FileBackend::hashed(&files).unwrap();

        let keys: Vec<_> = ["/a.src", "/b/c.src", "/d e.src"]
            .iter()
            .map(|p| backend.key_for(Path::new(p)))
            .collect();
        for key in &keys {
            backend.write(key, b"bytes").unwrap();
        }
        std::fs::write(files.join("x.src.kbin.gz"), b"gz").unwrap();
        std::fs::create_dir(files.join("nested")).unwrap();
        std::fs::write(files.join("nested").join("y.kbin"), b"nested").unwrap();
        std::fs::write(files.join("README"), b"keep").unwrap();

        assert_eq!(backend.remove_all().unwrap(), 5);
        for key in &keys {
            assert!(!backend.exists(key).unwrap());
        }
        assert!(files.join("README").is_file());
    }

    #[test]
    fn hashed_remove_all_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::hashed(dir.path().join("cb.files")).unwrap();
        assert_eq!(backend.remove_all().unwrap(), 0);
    }

    #[test]
    fn mapped_reader_serves_maps() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::hashed(dir.path()).unwrap().with_reader(MappedRead);
        let key = backend.key_for(Path::new("/a.src"));
        backend.write(&key, b"mapped").unwrap();

        let bytes = backend.read(&key).unwrap();
        assert!(bytes.is_mapped());
        assert_eq!(&bytes[..], b"mapped");
    }

    #[test]
    fn hashed_name_over_filesystem_limit_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::hashed(dir.path()).unwrap();
        // 100 escaped separators alone exceed a 255-byte file name.
        let source = PathBuf::from(format!("/{}", "d/".repeat(100)));
        let key = backend.key_for(&source.join("a.src"));
        assert!(key.to_path().file_name().unwrap().len() > 255);

        let err = backend.write(&key, b"bytes").unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
        assert!(!backend.exists(&key).unwrap());
    }

    #[test]
    fn artifact_suffix_matching() {
        assert!(has_artifact_suffix("a.src.kbin"));
        assert!(has_artifact_suffix("a.src.kbin.gz"));
        assert!(!has_artifact_suffix("a.src"));
        assert!(!has_artifact_suffix("a.kbinx"));
    }
}
