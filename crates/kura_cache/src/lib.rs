//! Storage layer of the Kura precompiled artifact cache.
//!
//! A [`CacheManager`] answers "give me the compiled artifact of this source"
//! by asking a [`StorageBackend`] whether a fresh artifact exists, and on a
//! miss either reports absence or runs a [`Compiler`] and stores its output.
//! Backends range from one file per artifact (optionally gzip-compressed or
//! memory-mapped) to an embedded key-value database and a write-once
//! append log with an offset index.

#![warn(missing_docs)]

pub mod artifact;
pub mod backend;
pub mod compiler;
pub mod error;
pub mod key;
pub mod manager;
pub mod open;
pub mod stats;

pub use artifact::ArtifactBytes;
pub use backend::{
    AppendLogBackend, BufferedRead, ByteReader, Compressed, DirectFileBackend, FileBackend,
    HashedFileBackend, IndexEntry, KeyValueBackend, MappedRead, NullBackend, StorageBackend,
    ARTIFACT_EXT,
};
pub use compiler::{CommandCompiler, CompileError, Compiler, NoCompiler, ENV_SOURCE_DIGEST};
pub use error::CacheError;
pub use key::{escape_path, CacheKey, EscapedDirNamer, IdentityNamer, KeyNamer, SuffixNamer};
pub use manager::CacheManager;
pub use open::open_backend;
pub use stats::Statistics;
