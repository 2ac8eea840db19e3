//! Logging for keyholder-proxy
//!
//! Diagnostics go to stderr through tracing; authorization decisions can
//! additionally be appended to a JSONL audit file.

pub mod audit;

pub use audit::{AuditEvent, AuditEventKind, AuditWriter, Decision};

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem
///
/// The default level is INFO; `verbose` raises it to DEBUG and `quiet`
/// lowers it to WARN. `RUST_LOG` overrides either.
pub fn init(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::WARN
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    // Tests may initialize more than once; later calls are no-ops.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
