//! Parsing and validation of `kura.toml` cache configuration files.
//!
//! This crate reads the cache configuration file, applies `KURA_*`
//! environment overrides, and produces a strongly-typed [`CacheConfig`]
//! naming the storage backend, the cache root, and the miss policy.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, load_config_from_str, resolve_config};
pub use types::*;
