//! Configuration file loading, environment overrides, and validation.

use crate::error::ConfigError;
use crate::types::CacheConfig;
use std::path::{Path, PathBuf};

/// Environment variable selecting the storage backend.
pub const ENV_STORAGE: &str = "KURA_STORAGE";
/// Environment variable overriding the cache root directory.
pub const ENV_STORAGE_DIR: &str = "KURA_STORAGE_DIR";
/// Environment variable enabling compilation on cache misses.
pub const ENV_AUTO_COMPILE: &str = "KURA_AUTO_COMPILE";
/// Environment variable enabling memory-mapped reads.
pub const ENV_USE_MMAP: &str = "KURA_USE_MMAP";

/// Loads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<CacheConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<CacheConfig, ConfigError> {
    let config: CacheConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Builds the effective configuration for a process.
///
/// Starts from the given file (or the defaults when `None`), then applies
/// `KURA_*` environment overrides from the process environment.
pub fn resolve_config(path: Option<&Path>) -> Result<CacheConfig, ConfigError> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => CacheConfig::default(),
    };
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Applies environment overrides on top of a configuration.
///
/// `lookup` returns the value of an environment variable, which keeps this
/// function independent of the real process environment in tests. Empty
/// values are treated as unset.
pub fn apply_env_overrides<F>(mut config: CacheConfig, lookup: F) -> Result<CacheConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(value) = get(ENV_STORAGE) {
        config.backend = value.parse()?;
    }
    if let Some(value) = get(ENV_STORAGE_DIR) {
        config.root = PathBuf::from(value);
    }
    if let Some(value) = get(ENV_AUTO_COMPILE) {
        config.auto_compile = parse_flag(ENV_AUTO_COMPILE, &value)?;
    }
    if let Some(value) = get(ENV_USE_MMAP) {
        config.use_mmap = parse_flag(ENV_USE_MMAP, &value)?;
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Validates that configuration values are usable.
fn validate_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "root must not be empty".to_string(),
        ));
    }
    if let Some(compiler) = &config.compiler {
        if compiler.command.is_empty() {
            return Err(ConfigError::ValidationError(
                "compiler.command must name a program".to_string(),
            ));
        }
    }
    Ok(())
}
