//! Kura CLI: the command-line interface to the precompiled artifact cache.
//!
//! Provides `kura compile` to populate the cache, `kura load` to fetch an
//! artifact, and `kura rm` / `kura rm-all` to evict artifacts.

#![warn(missing_docs)]

mod compile;
mod load;
mod remove;
mod session;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use kura_config::BackendKind;

/// Kura, a cache for precompiled artifacts.
#[derive(Parser, Debug)]
#[command(name = "kura", version, about = "Kura precompiled artifact cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `kura.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Storage backend, overriding configuration and environment.
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    /// Cache root directory, overriding configuration and environment.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Compile and store on a cache miss.
    #[arg(long, global = true)]
    pub auto_compile: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile source files and store their artifacts.
    Compile {
        /// Source files to compile.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Fetch the cached artifact of a source file.
    Load {
        /// Source file whose artifact is requested.
        file: PathBuf,

        /// Write the artifact here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove the cached artifacts of source files.
    Rm {
        /// Source files whose artifacts are removed.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove every artifact held by the backend.
    RmAll,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
    /// Backend override.
    pub backend: Option<BackendKind>,
    /// Cache root override.
    pub root: Option<PathBuf>,
    /// Whether to force auto-compile on.
    pub auto_compile: bool,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
        backend: cli.backend,
        root: cli.root,
        auto_compile: cli.auto_compile,
    };
    session::init_logging(&global);

    let result = match cli.command {
        Command::Compile { ref files } => compile::run(files, &global),
        Command::Load {
            ref file,
            ref output,
        } => load::run(file, output.as_deref(), &global),
        Command::Rm { ref files } => remove::run(files, &global),
        Command::RmAll => remove::run_all(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
