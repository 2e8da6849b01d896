//! # Cache Configuration
//!
//! Connection and keying settings for the cache handle. Values come from
//! `CACHE_*` environment variables or from a `.env`, JSON, YAML or TOML file
//! selected by `CACHE_CONFIG_SOURCE`; see [`ConfigLoader`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use typed_cache::config::ConfigLoader;
//!
//! let config = ConfigLoader::load();
//! println!("namespace: {}", config.namespace);
//! ```

pub mod error;
pub mod loader;

use crate::cache::errors::{CacheError, CacheResult};
use crate::constants::dependency::DEFAULT_PRIORITY;
use crate::constants::keys::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{ConfigLoader, ConfigSource};

/// Cache dependency configuration
///
/// Every field accepts its `CACHE_*` spelling as well as the field name, so
/// the same keys work in the environment, dotenv files and structured files.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Priority of the cache among the process dependencies
    #[serde(alias = "CACHE_DEPENDENCY_PRIORITY", alias = "cache_dependency_priority")]
    pub dependency_priority: i32,

    /// Segment prepended to every key
    #[serde(alias = "CACHE_NAMESPACE", alias = "cache_namespace")]
    pub namespace: String,

    /// Logical database; ignored by cluster topologies
    #[serde(alias = "CACHE_DB", alias = "cache_db")]
    pub db: i64,

    #[serde(alias = "CACHE_USERNAME", alias = "cache_username")]
    pub username: String,

    #[serde(alias = "CACHE_PASSWORD", alias = "cache_password")]
    pub password: String,

    /// Comma-separated `host:port` list; a comma (even trailing) selects cluster mode
    #[serde(alias = "CACHE_ADDRESSES", alias = "cache_addresses")]
    pub addresses: String,

    /// Comma-separated sentinel `host:port` list, used when `addresses` is empty
    #[serde(alias = "CACHE_SENTINEL_ADDRESSES", alias = "cache_sentinel_addresses")]
    pub sentinel_addresses: String,

    #[serde(alias = "CACHE_SENTINEL_MASTER", alias = "cache_sentinel_master")]
    pub sentinel_master: String,

    #[serde(alias = "CACHE_SENTINEL_USERNAME", alias = "cache_sentinel_username")]
    pub sentinel_username: String,

    #[serde(alias = "CACHE_SENTINEL_PASSWORD", alias = "cache_sentinel_password")]
    pub sentinel_password: String,

    /// Sentinel-managed deployment runs in cluster mode
    #[serde(alias = "CACHE_SENTINEL_CLUSTER", alias = "cache_sentinel_cluster")]
    pub sentinel_cluster: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dependency_priority: DEFAULT_PRIORITY,
            namespace: DEFAULT_NAMESPACE.to_string(),
            db: 0,
            username: String::new(),
            password: String::new(),
            addresses: String::new(),
            sentinel_addresses: String::new(),
            sentinel_master: String::new(),
            sentinel_username: String::new(),
            sentinel_password: String::new(),
            sentinel_cluster: false,
        }
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "[EMPTY]"
    } else {
        "[MASKED]"
    }
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("dependency_priority", &self.dependency_priority)
            .field("namespace", &self.namespace)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .field("addresses", &self.addresses)
            .field("sentinel_addresses", &self.sentinel_addresses)
            .field("sentinel_master", &self.sentinel_master)
            .field("sentinel_username", &self.sentinel_username)
            .field("sentinel_password", &mask(&self.sentinel_password))
            .field("sentinel_cluster", &self.sentinel_cluster)
            .finish()
    }
}

/// Backend layout resolved from the address settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Standalone { address: String },
    Cluster { addresses: Vec<String> },
    Sentinel {
        addresses: Vec<String>,
        master: String,
        cluster: bool,
    },
}

impl Topology {
    /// Whether key scans must fan out per partition
    pub fn is_clustered(&self) -> bool {
        match self {
            Self::Standalone { .. } => false,
            Self::Cluster { .. } => true,
            Self::Sentinel { cluster, .. } => *cluster,
        }
    }
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl CacheConfig {
    /// Apply fallbacks for values left unset by the source
    pub fn normalized(mut self) -> Self {
        if self.dependency_priority == 0 {
            self.dependency_priority = DEFAULT_PRIORITY;
        }
        if self.namespace.trim().is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        self
    }

    /// Resolve which backend layout to connect to
    ///
    /// `addresses` takes precedence over `sentinel_addresses`; exactly one of
    /// them must produce a non-empty list.
    pub fn topology(&self) -> CacheResult<Topology> {
        if !self.addresses.trim().is_empty() {
            let addresses = split_addresses(&self.addresses);
            if addresses.is_empty() {
                return Err(CacheError::Connection(
                    "failed to open connection: addresses is empty".to_string(),
                ));
            }
            if self.addresses.contains(',') {
                return Ok(Topology::Cluster { addresses });
            }
            return Ok(Topology::Standalone {
                address: addresses[0].clone(),
            });
        }

        if !self.sentinel_addresses.trim().is_empty() {
            let addresses = split_addresses(&self.sentinel_addresses);
            if addresses.is_empty() {
                return Err(CacheError::Connection(
                    "failed to open connection: sentinel addresses is empty".to_string(),
                ));
            }
            return Ok(Topology::Sentinel {
                addresses,
                master: self.sentinel_master.clone(),
                cluster: self.sentinel_cluster,
            });
        }

        Err(CacheError::Connection(
            "at least one of addresses and sentinel addresses must be defined".to_string(),
        ))
    }

    /// Credentials and database for data nodes
    pub fn node_connection_info(&self) -> redis::RedisConnectionInfo {
        redis::RedisConnectionInfo {
            db: self.db,
            username: non_empty(&self.username),
            password: non_empty(&self.password),
            ..Default::default()
        }
    }

    /// Credentials for sentinel nodes
    pub fn sentinel_connection_info(&self) -> redis::RedisConnectionInfo {
        redis::RedisConnectionInfo {
            username: non_empty(&self.sentinel_username),
            password: non_empty(&self.sentinel_password),
            ..Default::default()
        }
    }
}
