//! # Structured Logging Module
//!
//! Environment-aware structured logging for applications embedding the cache.
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the process, and this module provides the default one.

use crate::constants::env::{ENVIRONMENT, LOG_FORMAT};
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` wins over the environment-derived level. Set
/// `CACHE_LOG_FORMAT=json` for JSON lines. Safe to call more than once.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format();

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
        let registry = tracing_subscriber::registry().with(filter);

        // Use try_init to avoid panic if global subscriber already set
        let result = if json {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(true),
                )
                .try_init()
        };

        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(ENVIRONMENT)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var(LOG_FORMAT)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for cache lifecycle operations
pub fn log_cache_operation(
    operation: &str,
    namespace: &str,
    provider: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        namespace = %namespace,
        provider = provider,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CACHE_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_cache_operation("open", "cache-app", Some("memory"), "ok", None);
    }
}
