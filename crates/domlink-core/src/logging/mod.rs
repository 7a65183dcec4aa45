//! Structured logging with `tracing`.
//!
//! Connection lifecycle, routing decisions, and protocol violations are all
//! reported as `tracing` events with structured fields (`uri`, `message_id`,
//! `frame_type`, `attempt`). Binaries call [`init_subscriber`] once; tests use
//! [`capture_logs`] to assert on emitted events.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Initialize the global tracing subscriber with stderr output.
///
/// `RUST_LOG` takes precedence over `level` when set. Subsequent calls are
/// no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with JSON lines on stderr.
pub fn init_json_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .try_init();
}
