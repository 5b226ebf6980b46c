//! Development-time tracing for debugging stepchat.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. Conversation output
//! (assistant lines, the `User: ` prompt) goes to stdout, and transcript logs
//! written by `io/transcript_log` are unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=stepchat=debug cargo run -- run --script scripts/land_course_followup.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
