//! Tracing initialization.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when RUST_LOG is unset.
pub const DEFAULT_FILTER: &str = "info,tower_http=info,axum=info,sqlx=warn";

/// Install the global subscriber. RUST_LOG overrides `default_filter`, e.g.
/// `RUST_LOG=debug,roomkeys=trace,tower_http=info`.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
