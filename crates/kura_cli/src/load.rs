//! `kura load`: fetch a cached artifact.

use std::io::Write;
use std::path::Path;

use kura_cache::CacheManager;
use kura_common::SourceDescriptor;

use crate::session::{load_config, open_manager};
use crate::GlobalArgs;

/// Runs the `kura load` command.
///
/// Writes the artifact to `output`, or to stdout when no output path is
/// given. Returns exit code 0 on a hit, 1 on a miss. The cache is closed
/// whether or not the lookup succeeds.
pub fn run(
    file: &Path,
    output: Option<&Path>,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    let mut manager = open_manager(&config)?;
    let result = fetch(&mut manager, file, output, global);
    let closed = manager.close();
    let code = result?;
    closed?;
    Ok(code)
}

fn fetch(
    manager: &mut CacheManager,
    file: &Path,
    output: Option<&Path>,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let source = SourceDescriptor::stat(file)?;

    let Some(bytes) = manager.load(&source)? else {
        if !global.quiet {
            eprintln!("miss: no fresh artifact for {}", source.path.display());
        }
        return Ok(1);
    };

    match output {
        Some(path) => std::fs::write(path, &bytes[..])?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(0)
}
