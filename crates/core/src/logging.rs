//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when neither `RUST_LOG` nor the config provide one.
pub const DEFAULT_FILTER: &str = "info,renderer_renderer=debug,renderer_rhi=info";

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. An unparsable
/// `default_filter` falls back to [`DEFAULT_FILTER`].
///
/// # Example
/// ```
/// renderer_core::init_logging("info");
/// tracing::info!("engine starting");
/// ```
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Repeated initialization happens in tests.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
