//! Diagnostic tracing on stderr.
//!
//! Product output (per-file lines, summaries, JSON) is printed by
//! [`crate::report`] on stdout and is unaffected by the filter set here.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `--trace` selects `trace`, `--debug`
/// selects `debug`, and the default is `warn`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=chatdrop=debug chatdrop import --input chat.md
/// ```
pub fn init(debug: bool, trace: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(debug, trace)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn default_level(debug: bool, trace: bool) -> &'static str {
    if trace {
        "trace"
    } else if debug {
        "debug"
    } else {
        "warn"
    }
}
