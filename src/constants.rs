//! # System Constants
//!
//! Fixed values that define key layout, default lifetimes and the
//! operational bounds of every cache round-trip.

use std::time::Duration;

/// Key layout
pub mod keys {
    /// Namespace used when configuration does not provide one
    pub const DEFAULT_NAMESPACE: &str = "cache-app";

    /// Single-character delimiter between namespace, prefix and base key
    pub const KEY_SEPARATOR: &str = ":";

    /// Prefix segment applied to every rate-limit key
    pub const KEY_RATE_LIMIT: &str = "rate-limit";

    /// Trailing wildcard stripped from caller-supplied scan prefixes
    pub const SCAN_WILDCARD: char = '*';
}

/// Default time-to-live for `Put` when no positive TTL was configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Deadline applied to a request builder when the caller supplies none
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Keys requested per SCAN page
pub const SCAN_BATCH_SIZE: usize = 100;

/// Value written by the rate limiter's conditional create
pub const RATE_LIMIT_MARKER: &str = "1";

/// Dependency registry identity
pub mod dependency {
    /// Name reported to the dependency registry
    pub const NAME: &str = "Cache";

    /// Priority used when configuration leaves it unset (or zero)
    pub const DEFAULT_PRIORITY: i32 = 10;
}

/// Environment variables read at configuration load time
pub mod env {
    /// Selects the configuration source: `OS` (default) or a file path
    pub const CONFIG_SOURCE: &str = "CACHE_CONFIG_SOURCE";

    /// Prefix shared by every configuration key in the environment
    pub const CONFIG_PREFIX: &str = "CACHE";

    /// `json` switches structured logging to JSON lines
    pub const LOG_FORMAT: &str = "CACHE_LOG_FORMAT";

    /// Environment name used to derive the default log level
    pub const ENVIRONMENT: &str = "CACHE_ENV";
}
