//! Configuration Loader
//!
//! Source selection follows `CACHE_CONFIG_SOURCE`:
//! 0. unset, empty or `OS`: `CACHE_*` environment variables
//! 1. a path ending in `.env`: dotenv file (via dotenvy)
//! 2. a path ending in `.json`, `.yaml`, `.yml` or `.toml`: structured file
//!
//! Loading never fails the process. Errors are logged and the defaults are
//! used instead; fallbacks for unset values are applied either way.

use super::error::{ConfigResult, ConfigurationError};
use super::CacheConfig;
use crate::constants::env::{CONFIG_PREFIX, CONFIG_SOURCE};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where configuration values are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Process environment (`CACHE_*`)
    Os,
    /// Dotenv or structured file, picked by extension
    File(PathBuf),
}

impl ConfigSource {
    /// Read the selector from `CACHE_CONFIG_SOURCE`
    pub fn from_env() -> Self {
        Self::parse(std::env::var(CONFIG_SOURCE).ok().as_deref())
    }

    pub fn parse(selector: Option<&str>) -> Self {
        match selector.map(str::trim) {
            None | Some("") => Self::Os,
            Some(value) if value.eq_ignore_ascii_case("os") => Self::Os,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

/// Zero-state configuration loader
#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the source selected by the environment
    pub fn load() -> CacheConfig {
        Self::load_from(&ConfigSource::from_env())
    }

    /// Load from `source`, falling back to defaults on any error
    pub fn load_from(source: &ConfigSource) -> CacheConfig {
        match Self::try_load(source) {
            Ok(config) => {
                debug!(source = ?source, config = ?config, "Cache configuration loaded");
                config.normalized()
            }
            Err(e) => {
                warn!(
                    source = ?source,
                    error = %e,
                    "dependency config - failed to load config, using defaults"
                );
                CacheConfig::default()
            }
        }
    }

    /// Load from `source`, surfacing errors
    pub fn try_load(source: &ConfigSource) -> ConfigResult<CacheConfig> {
        match source {
            ConfigSource::Os => Self::from_environment(None),
            ConfigSource::File(path) => Self::from_file(path),
        }
    }

    /// Deserialize `CACHE_*` variables; `vars` replaces the process environment
    pub fn from_environment(
        vars: Option<config::Map<String, String>>,
    ) -> ConfigResult<CacheConfig> {
        let environment = Environment::with_prefix(CONFIG_PREFIX)
            .prefix_separator("_")
            .source(vars);

        Config::builder()
            .add_source(environment)
            .build()
            .and_then(Config::try_deserialize::<CacheConfig>)
            .map_err(|e| ConfigurationError::parse_error("environment", e))
    }

    fn from_file(path: &Path) -> ConfigResult<CacheConfig> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        // `.env` has no extension as far as Path is concerned
        if file_name == ".env" || extension.as_deref() == Some("env") {
            return Self::from_dotenv(path);
        }

        let format = match extension.as_deref() {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("toml") => FileFormat::Toml,
            _ => {
                return Err(ConfigurationError::UnsupportedFormat {
                    file_path: path.display().to_string(),
                })
            }
        };

        if !path.is_file() {
            return Err(ConfigurationError::file_read_error(
                path.display().to_string(),
                "not a regular file",
            ));
        }

        Config::builder()
            .add_source(File::from(path).format(format).required(true))
            .build()
            .and_then(Config::try_deserialize::<CacheConfig>)
            .map_err(|e| ConfigurationError::parse_error(path.display().to_string(), e))
    }

    fn from_dotenv(path: &Path) -> ConfigResult<CacheConfig> {
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        let vars = entries
            .collect::<Result<config::Map<String, String>, _>>()
            .map_err(|e| ConfigurationError::parse_error(path.display().to_string(), e))?;

        Self::from_environment(Some(vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_source_selector() {
        assert_eq!(ConfigSource::parse(None), ConfigSource::Os);
        assert_eq!(ConfigSource::parse(Some(" ")), ConfigSource::Os);
        assert_eq!(ConfigSource::parse(Some("os")), ConfigSource::Os);
        assert_eq!(
            ConfigSource::parse(Some("./.env")),
            ConfigSource::File(PathBuf::from("./.env"))
        );
    }

    #[test]
    fn test_environment_variables() {
        let config = ConfigLoader::from_environment(Some(vars(&[
            ("CACHE_NAMESPACE", "orders"),
            ("CACHE_DEPENDENCY_PRIORITY", "3"),
            ("CACHE_DB", "2"),
            ("CACHE_ADDRESSES", "redis-1:6379,redis-2:6379"),
            ("CACHE_SENTINEL_CLUSTER", "true"),
            ("UNRELATED", "ignored"),
        ])))
        .unwrap();

        assert_eq!(config.namespace, "orders");
        assert_eq!(config.dependency_priority, 3);
        assert_eq!(config.db, 2);
        assert_eq!(config.addresses, "redis-1:6379,redis-2:6379");
        assert!(config.sentinel_cluster);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = ConfigLoader::from_environment(Some(vars(&[])))
            .unwrap()
            .normalized();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_unsupported_extension_falls_back_to_defaults() {
        let source = ConfigSource::File(PathBuf::from("settings.ini"));
        assert!(matches!(
            ConfigLoader::try_load(&source),
            Err(ConfigurationError::UnsupportedFormat { .. })
        ));
        assert_eq!(ConfigLoader::load_from(&source), CacheConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let source = ConfigSource::File(PathBuf::from("/definitely/not/here.toml"));
        assert!(ConfigLoader::try_load(&source).is_err());
        assert_eq!(ConfigLoader::load_from(&source), CacheConfig::default());
    }
}
