//! Shared setup for every subcommand: logging, configuration, cache manager.

use std::path::{Path, PathBuf};

use kura_cache::{CacheManager, CommandCompiler, Compiler, NoCompiler};
use kura_config::{resolve_config, CacheConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::GlobalArgs;

/// Configuration file looked up in the working directory when `--config`
/// is not given.
const DEFAULT_CONFIG_FILE: &str = "kura.toml";

/// Environment variable holding a `tracing` filter directive.
const ENV_LOG: &str = "KURA_LOG";

/// Installs the global `tracing` subscriber writing to stderr.
///
/// `KURA_LOG` takes precedence over the `-v`/`-q` flags.
pub fn init_logging(global: &GlobalArgs) {
    let default_level = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves the effective configuration.
///
/// Precedence, lowest first: built-in defaults, the configuration file,
/// `KURA_*` environment variables, command-line flags.
pub fn load_config(global: &GlobalArgs) -> Result<CacheConfig, Box<dyn std::error::Error>> {
    let file = match &global.config {
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };
    let mut config = resolve_config(file.as_deref())?;

    if let Some(backend) = global.backend {
        config.backend = backend;
    }
    if let Some(root) = &global.root {
        config.root = root.clone();
    }
    if global.auto_compile {
        config.auto_compile = true;
    }
    debug!(backend = %config.backend, root = %config.root.display(), "resolved configuration");
    Ok(config)
}

/// Opens a cache manager for `config` with its configured compiler.
pub fn open_manager(config: &CacheConfig) -> Result<CacheManager, Box<dyn std::error::Error>> {
    let compiler: Box<dyn Compiler> = match config.compiler.as_ref().and_then(CommandCompiler::from_config) {
        Some(compiler) => Box::new(compiler),
        None => Box::new(NoCompiler),
    };
    Ok(CacheManager::from_config(config, compiler)?)
}

/// Canonicalizes `path` so it names the same artifact as a stat'ed source.
///
/// Falls back to the path as given when the source no longer exists.
pub fn source_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
