//! `cbc`: command-line driver for the Cb interpreter core.
//!
//! Parses arguments, wires up logging, and loads an `Engine`. Source
//! lexing/parsing and the HIR -> C++ backend live outside this crate's
//! scope (see `cb_core`'s module docs); this binary's job is the ambient
//! glue around the core: argument handling, diagnostics formatting, and
//! exit-code policy.

use cb_core::error::{CbError, CbResult};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run a Cb source file.
#[derive(Parser)]
#[command(name = "cbc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cb interpreter driver", long_about = None)]
struct Cli {
    /// Source file to run
    file: PathBuf,

    /// Enable verbose (DEBUG-level) logging to stderr
    #[arg(long)]
    debug: bool,

    /// Emit compiler-mode artifacts instead of interpreting directly
    #[arg(short = 'c', long = "compile")]
    compile: bool,

    /// Output path for compiler-mode artifacts (requires --compile)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cb_core::diagnostics::init_logging(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // `CbError`'s own Display already renders "file:line: message"
            // when a SourceLocation is attached; only CLI-level errors
            // (no location yet) need the file name prepended here.
            if err.location.is_some() {
                eprintln!("{err}");
            } else {
                eprintln!("{}: {err}", cli.file.display());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CbResult<()> {
    if cli.compile || cli.output.is_some() {
        return Err(CbError::resource(
            "compiler-mode output (-c/-o) is not supported by this build; the HIR to C++ backend is out of scope",
        ));
    }

    let source = std::fs::read_to_string(&cli.file)
        .map_err(|e| CbError::resource(format!("could not read '{}': {e}", cli.file.display())))?;
    tracing::debug!(bytes = source.len(), path = %cli.file.display(), "source file read");

    run_source(&source)
}

/// Loads and runs a Cb program. Lexing/parsing source text into an
/// [`cb_core::ast::AstNode`] tree is outside this crate's scope — a
/// front end plugs in here by producing that tree and handing it to
/// [`cb_runtime::Engine::load_program`]; this binary exposes the CLI
/// contract around that seam without implementing the seam itself.
fn run_source(_source: &str) -> CbResult<()> {
    Err(CbError::declaration(
        "no Cb front end is wired into this build; supply an AstNode via the cb_runtime API directly",
    ))
}
