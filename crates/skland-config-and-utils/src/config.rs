//! Configuration management for the companion.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default Hypergryph identity service base URL (can be overridden at compile
/// time via the HYPERGRYPH_BASE_URL env var).
pub const DEFAULT_HYPERGRYPH_BASE_URL: &str = match option_env!("HYPERGRYPH_BASE_URL") {
    Some(url) => url,
    None => "https://as.hypergryph.com",
};

/// Default Skland API base URL (can be overridden at compile time via the
/// SKLAND_BASE_URL env var).
pub const DEFAULT_SKLAND_BASE_URL: &str = match option_env!("SKLAND_BASE_URL") {
    Some(url) => url,
    None => "https://zonai.skland.com",
};

/// OAuth application code identifying the Skland app to the identity service.
pub const SKLAND_APP_CODE: &str = "4ca99fa6b56cc2ba";

/// Client version string sent in the `vName` header.
pub const SKLAND_CLIENT_VERSION: &str = "1.0.0";

/// Platform discriminator sent in the `platform` header.
pub const PLATFORM_CODE: &str = "3";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 8 * 60;
const DEFAULT_SESSION_EXPIRY_DAYS: u64 = 30;
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 300;
const DEFAULT_NETWORK_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_RESTORE_ATTEMPTS: u32 = 3;

/// Main companion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Hypergryph identity service base URL.
    #[serde(default = "default_hypergryph_base_url")]
    pub hypergryph_base_url: String,
    /// Skland API base URL.
    #[serde(default = "default_skland_base_url")]
    pub skland_base_url: String,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a derived session credential is served from cache without a
    /// new exchange. Empirical tunable, not a server contract.
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,
    /// Age after which a stored session is deleted on load.
    #[serde(default = "default_session_expiry_days")]
    pub session_expiry_days: u64,
    /// Window for coalescing rapid session-store writes.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// Retries for network-classified exchange failures.
    #[serde(default = "default_network_retries")]
    pub network_retries: u32,
    /// Fixed delay between exchange retries.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Cap on restore attempts per process lifetime.
    #[serde(default = "default_max_restore_attempts")]
    pub max_restore_attempts: u32,
}

fn default_hypergryph_base_url() -> String {
    DEFAULT_HYPERGRYPH_BASE_URL.to_string()
}

fn default_skland_base_url() -> String {
    DEFAULT_SKLAND_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_freshness_window_secs() -> u64 {
    DEFAULT_FRESHNESS_WINDOW_SECS
}

fn default_session_expiry_days() -> u64 {
    DEFAULT_SESSION_EXPIRY_DAYS
}

fn default_save_debounce_ms() -> u64 {
    DEFAULT_SAVE_DEBOUNCE_MS
}

fn default_network_retries() -> u32 {
    DEFAULT_NETWORK_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_max_restore_attempts() -> u32 {
    DEFAULT_MAX_RESTORE_ATTEMPTS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            hypergryph_base_url: DEFAULT_HYPERGRYPH_BASE_URL.to_string(),
            skland_base_url: DEFAULT_SKLAND_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
            session_expiry_days: DEFAULT_SESSION_EXPIRY_DAYS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            network_retries: DEFAULT_NETWORK_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_restore_attempts: DEFAULT_MAX_RESTORE_ATTEMPTS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("SKLAND_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(secs) = std::env::var("SKLAND_FRESHNESS_WINDOW_SECS") {
            if let Ok(secs) = secs.parse() {
                self.freshness_window_secs = secs;
            }
        }
    }
}
