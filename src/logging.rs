//! Tracing setup for the `itx` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to the binary. Logs go to stderr and are filtered by `ITX_LOG`
//! (same syntax as `RUST_LOG`), defaulting to `warn`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ITX_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Install the global stderr subscriber. A second call is a no-op.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
