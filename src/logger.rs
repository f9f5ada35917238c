//! Tracing subscriber setup shared by tests and downstream binaries.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Default level INFO, overridable through `RUST_LOG` (e.g.
/// `RUST_LOG=hypergraph_solver=debug`). Safe to call repeatedly; after the
/// first call the rest are no-ops, so every test can initialize logging
/// without coordinating.
pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_target(true)
        .try_init();
}
