//! Shared configuration and utilities for the Skland companion.
//!
//! This crate provides:
//! - `Config`: runtime configuration with env overrides and JSON file persistence
//! - `CoreError`/`CoreResult`: the base error type shared across crates
//! - Logging initialization via `tracing-subscriber`
//! - Protocol constants (endpoint bases, app code, client version)

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_HYPERGRYPH_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_SKLAND_BASE_URL,
    PLATFORM_CODE, SKLAND_APP_CODE, SKLAND_CLIENT_VERSION,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
