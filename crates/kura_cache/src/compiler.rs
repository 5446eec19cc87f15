//! The compiler collaborator invoked on cache misses.
//!
//! The cache never looks inside artifacts. A [`Compiler`] turns a source
//! file into opaque bytes, and the cache only decides when to call it.

use std::path::Path;
use std::process::Command;

use kura_common::ContentHash;
use kura_config::CompilerConfig;
use tracing::debug;

/// Environment variable carrying the source's integrity tag to the compiler.
pub const ENV_SOURCE_DIGEST: &str = "KURA_SOURCE_DIGEST";

/// A compiler failed to produce an artifact.
///
/// Compile failures are the one error the cache manager recovers from: they
/// are logged and reported to the caller as a miss.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    /// Description of the failure.
    pub message: String,
}

impl CompileError {
    /// Creates a new compile error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for CompileError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Produces artifact bytes from a source file.
pub trait Compiler {
    /// Compiles the source at `source` and returns the artifact bytes.
    fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError>;
}

impl<F> Compiler for F
where
    F: Fn(&Path) -> Result<Vec<u8>, CompileError>,
{
    fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError> {
        self(source)
    }
}

/// The compiler used when none is configured. Every compilation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompiler;

impl Compiler for NoCompiler {
    fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError> {
        Err(CompileError::new(format!(
            "no compiler configured for {}",
            source.display()
        )))
    }
}

/// Runs an external program and takes its standard output as the artifact.
///
/// The source path is passed as the final argument and the source's
/// integrity tag (`xxh3:<hex>`) in [`ENV_SOURCE_DIGEST`], so the program can
/// embed it in the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    /// Creates a compiler running `program` with leading `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds a compiler from the `[compiler]` configuration table.
    ///
    /// Returns `None` for an empty command.
    pub fn from_config(config: &CompilerConfig) -> Option<Self> {
        let (program, args) = config.command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// The program being run.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, source: &Path) -> Result<Vec<u8>, CompileError> {
        let digest = ContentHash::of_file(source).map_err(|e| {
            CompileError::new(format!("cannot read {}: {e}", source.display()))
        })?;

        debug!(program = %self.program, source = %source.display(), "running compiler");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .env(ENV_SOURCE_DIGEST, digest.integrity_tag())
            .output()
            .map_err(|e| CompileError::new(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(CompileError::new(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                format!("{} exited with {}: {stderr}", self.program, output.status)
            }));
        }
        Ok(output.stdout)
    }
}
