//! Logging initialization for the companion.
//!
//! All crates log through `tracing`; this module wires up the subscriber once
//! at process start. Output is human-readable by default and structured JSON
//! when `SKLAND_LOG_FORMAT=json` is set.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system.
///
/// Log level is taken from `RUST_LOG` when set, otherwise from the provided
/// default.
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("companion started");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let json = std::env::var("SKLAND_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second init (e.g. in tests) is not an error worth surfacing.
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
