//! Logging setup shared by the CLI and any embedder of the interpreter.
//!
//! Grounded in the teacher's `tracing`/`tracing-subscriber` setup
//! (`seq-lsp`, `seq-repl`): `--debug` raises the level to `DEBUG` and turns
//! on every module's traces; otherwise only `WARN`/`ERROR` reach stderr.
//! This is the fine-grained trace facility the spec's "debug logging" line
//! item (§1, out of scope for behavior but present as ambient stack) and
//! the supplemented debug-service feature (SPEC_FULL.md) both route
//! through.

use tracing_subscriber::EnvFilter;

/// Install a stderr-only subscriber. Safe to call once at process start;
/// a second call is a harmless no-op (the global subscriber is left in
/// place), which matters for tests that may initialize logging more than
/// once.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
