//! `kura compile`: compile sources and store their artifacts.

use std::path::PathBuf;

use kura_common::SourceDescriptor;

use crate::session::{load_config, open_manager};
use crate::GlobalArgs;

/// Runs the `kura compile` command.
///
/// Every file is compiled even if an earlier one fails, and the cache is
/// always closed so artifacts stored before a failure stay discoverable.
/// Returns exit code 0 if all artifacts were stored, 1 otherwise.
pub fn run(files: &[PathBuf], global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    let mut manager = open_manager(&config)?;
    let mut failed = 0usize;

    for file in files {
        let source = match SourceDescriptor::stat(file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("error: cannot read {}: {e}", file.display());
                failed += 1;
                continue;
            }
        };
        match manager.store(&source, None) {
            Ok(Some(bytes)) => {
                if !global.quiet {
                    eprintln!("   Compiled {} ({} bytes)", source.path.display(), bytes.len());
                }
            }
            Ok(None) => failed += 1,
            Err(e) => {
                eprintln!("error: {e}");
                failed += 1;
            }
        }
    }

    manager.close()?;
    Ok(if failed == 0 { 0 } else { 1 })
}
