//! Logging setup shared by the command-line tools.

use tracing_subscriber::EnvFilter;

/// Default level for a tool run: `debug` with `verbose`, `error` with
/// `quiet`, otherwise `info`.
pub fn default_level(verbose: bool, quiet: bool) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    }
}

/// Install a stderr `fmt` subscriber. `RUST_LOG` takes precedence over the
/// flags. Calling this twice is harmless; the second call does nothing.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(verbose, quiet)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
