//! `kura rm` and `kura rm-all`: evict artifacts.

use std::path::PathBuf;

use crate::session::{load_config, open_manager, source_path};
use crate::GlobalArgs;

/// Runs the `kura rm` command.
///
/// Attempts every file and closes the cache before reporting the first
/// failure.
pub fn run(files: &[PathBuf], global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    let mut manager = open_manager(&config)?;
    let mut first_error = None;
    for file in files {
        if let Err(e) = manager.remove(&source_path(file)) {
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    manager.close()?;
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(0),
    }
}

/// Runs the `kura rm-all` command.
pub fn run_all(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    let mut manager = open_manager(&config)?;
    let result = manager.remove_all();
    manager.close()?;
    let removed = result?;
    if !global.quiet {
        eprintln!("   Removed {removed} artifacts from {}", config.root.display());
    }
    Ok(0)
}
