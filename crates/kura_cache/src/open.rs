//! Backend construction from configuration.

use kura_config::{BackendKind, CacheConfig};
use tracing::{info, warn};

use crate::backend::{
    AppendLogBackend, Compressed, FileBackend, KeyValueBackend, MappedRead, NullBackend,
    StorageBackend,
};
use crate::error::CacheError;
use crate::key::KeyNamer;

/// Opens the backend selected by `config`.
///
/// The cache root is created for every backend that keeps its files there.
/// `use_mmap` only affects file backends and is ignored with a warning
/// elsewhere.
pub fn open_backend(config: &CacheConfig) -> Result<Box<dyn StorageBackend>, CacheError> {
    let kind = config.backend;
    if config.use_mmap && !kind.is_file_backed() {
        warn!(backend = %kind, "use_mmap has no effect on this backend");
    }
    if !matches!(kind, BackendKind::Direct | BackendKind::DirectGzip | BackendKind::Null) {
        std::fs::create_dir_all(&config.root).map_err(|e| CacheError::io(&config.root, e))?;
    }

    let backend: Box<dyn StorageBackend> = match kind {
        BackendKind::Direct => file_backend(FileBackend::direct(), false, config.use_mmap),
        BackendKind::DirectGzip => file_backend(FileBackend::direct(), true, config.use_mmap),
        BackendKind::Hashed => {
            file_backend(FileBackend::hashed(config.files_dir())?, false, config.use_mmap)
        }
        BackendKind::HashedGzip => {
            file_backend(FileBackend::hashed(config.files_dir())?, true, config.use_mmap)
        }
        BackendKind::KeyValue => Box::new(KeyValueBackend::open(config.db_path())?),
        BackendKind::AppendLog => Box::new(AppendLogBackend::open(
            config.index_path(),
            config.data_path(),
        )?),
        BackendKind::Null => Box::new(NullBackend),
    };

    info!(
        backend = backend.name(),
        root = %config.root.display(),
        mmap = config.use_mmap && kind.is_file_backed(),
        "opened cache backend"
    );
    Ok(backend)
}

/// Applies the read strategy and compression layer to a file backend.
fn file_backend<N>(backend: FileBackend<N>, gzip: bool, mmap: bool) -> Box<dyn StorageBackend>
where
    N: KeyNamer + 'static,
{
    match (mmap, gzip) {
        (false, false) => Box::new(backend),
        (false, true) => Box::new(Compressed::new(backend)),
        (true, false) => Box::new(backend.with_reader(MappedRead)),
        (true, true) => Box::new(Compressed::new(backend.with_reader(MappedRead))),
    }
}
