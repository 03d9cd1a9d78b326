//! Log output for the command line.
//!
//! Logs go to stderr so they never mix with resolved output on stdout.
//! Filtering follows `RUST_LOG`:
//! - `RUST_LOG=debug` - cache hits, chain steps and record writes
//! - `RUST_LOG=lineage::factory=debug` - only the cache gate
//!
//! Without `RUST_LOG` only warnings are shown; `--verbose` raises that to debug.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber. Call once, before any lookup.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_filter(filter);

    tracing_subscriber::registry().with(console_layer).init();
}
