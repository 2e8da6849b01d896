//! Long-lived cache handle
//!
//! The handle owns the backend connection and the configuration; request
//! builders borrow it for the duration of one operation. It is constructed
//! and passed explicitly, never stored in a global.

use super::connection::Connection;
use super::deadline::{Deadline, DeadlineScope};
use super::errors::{CacheError, CacheResult};
use super::executor::Executor;
use super::keys::{prepend_prefix, qualify};
use super::providers::MemoryStore;
use super::request::{DeleteRequest, GetRequest, SetRequest};
use super::traits::StoreClient;
use crate::config::{CacheConfig, ConfigLoader};
use crate::constants::dependency::NAME;
use crate::logging::log_cache_operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Dependency health statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyStats {
    pub uptime_seconds: f64,
    pub uptime_human: String,
    pub ping_latency_millis: i64,
    pub ping_latency_human: String,
    /// Ping reply, or the error text when the ping failed
    pub ping_response: String,
    pub started_at: Option<DateTime<Utc>>,
}

impl DependencyStats {
    /// JSON document for health endpoints
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_seconds": self.uptime_seconds,
            "uptime_human": self.uptime_human,
            "ping_latency_millis": self.ping_latency_millis,
            "ping_latency_human": self.ping_latency_human,
            "ping_response": self.ping_response,
            "started_at": self.started_at.map(|at| at.to_rfc3339()),
        })
    }
}

fn human(duration: Duration) -> String {
    format!("{duration:?}")
}

/// Cache handle bound to one backend connection
#[derive(Debug)]
pub struct CacheHandle {
    config: CacheConfig,
    connection: Option<Connection>,
    clustering: bool,
    opened_at: Option<(Instant, DateTime<Utc>)>,
}

impl CacheHandle {
    /// Closed handle for `config`
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: config.normalized(),
            connection: None,
            clustering: false,
            opened_at: None,
        }
    }

    /// Closed handle configured from the environment
    pub fn from_env() -> Self {
        Self::new(ConfigLoader::load())
    }

    /// Open handle over an existing connection
    pub fn with_connection(
        config: CacheConfig,
        connection: impl Into<Connection>,
        clustering: bool,
    ) -> Self {
        Self {
            config: config.normalized(),
            connection: Some(connection.into()),
            clustering,
            opened_at: Some((Instant::now(), Utc::now())),
        }
    }

    /// Open handle over an in-process store
    ///
    /// Clustering follows the store: a [`MemoryStore::cluster`] fans out
    /// key scans over its partitions.
    pub fn in_memory(config: CacheConfig, store: MemoryStore) -> Self {
        let clustering = store.is_clustered();
        Self::with_connection(config, store, clustering)
    }

    /// Establish the backend connection; no-op when already open
    pub async fn open(&mut self) -> CacheResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let (connection, clustering) = Connection::open(&self.config).await?;
        log_cache_operation(
            "open",
            &self.config.namespace,
            Some(connection.provider_name()),
            "connected",
            clustering.then_some("clustering"),
        );

        self.connection = Some(connection);
        self.clustering = clustering;
        self.opened_at = Some((Instant::now(), Utc::now()));
        Ok(())
    }

    /// Drop the backend connection; no-op when already closed
    pub async fn close(&mut self) -> CacheResult<()> {
        if let Some(connection) = self.connection.take() {
            log_cache_operation(
                "close",
                &self.config.namespace,
                Some(connection.provider_name()),
                "closed",
                None,
            );
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Borrow the open connection
    pub fn connection(&self) -> CacheResult<&Connection> {
        self.connection.as_ref().ok_or(CacheError::ClientNil)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Whether key scans fan out over partitions
    pub fn is_clustering(&self) -> bool {
        self.clustering
    }

    /// Dependency name
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Dependency priority
    pub fn priority(&self) -> i32 {
        self.config.dependency_priority
    }

    /// Fully-qualify an already-prefixed key
    pub(crate) fn qualify(&self, key: &str) -> String {
        qualify(self.namespace(), key)
    }

    /// Start a get request
    pub fn get(&self, deadline: Option<Deadline>, key: &str, prefix: &str) -> GetRequest<'_> {
        GetRequest::new(self, DeadlineScope::acquire(deadline), prepend_prefix(prefix, key))
    }

    /// Start a set request; prefixes are added with `set_prefix`
    pub fn set(&self, deadline: Option<Deadline>, key: &str) -> SetRequest<'_> {
        SetRequest::new(self, DeadlineScope::acquire(deadline), key.to_string())
    }

    /// Start a delete request
    pub fn delete(&self, deadline: Option<Deadline>, key: &str, prefix: &str) -> DeleteRequest<'_> {
        DeleteRequest::new(self, DeadlineScope::acquire(deadline), prepend_prefix(prefix, key))
    }

    /// Whether `key` exists; any failure reports `false`
    pub async fn has(&self, deadline: Option<Deadline>, key: &str, prefix: &str) -> bool {
        let Ok(connection) = self.connection() else {
            return false;
        };
        let scope = DeadlineScope::acquire(deadline);
        let key = self.qualify(&prepend_prefix(prefix, key));

        Executor::new(connection, scope.deadline())
            .exists(&key)
            .await
            .unwrap_or(false)
    }

    /// Uptime plus a timed ping when the connection is open
    pub async fn health_check(&self, deadline: Option<Deadline>) -> DependencyStats {
        let uptime = self
            .opened_at
            .map(|(at, _)| at.elapsed())
            .unwrap_or_default();
        let mut stats = DependencyStats {
            uptime_seconds: uptime.as_secs_f64(),
            uptime_human: human(uptime),
            started_at: self.opened_at.map(|(_, at)| at),
            ..DependencyStats::default()
        };

        let Some(connection) = &self.connection else {
            return stats;
        };

        let scope = DeadlineScope::acquire(deadline);
        let start = Instant::now();
        match scope.deadline().run("ping", "", connection.ping()).await {
            Ok(reply) => {
                let latency = start.elapsed();
                stats.ping_latency_millis = i64::try_from(latency.as_millis()).unwrap_or(i64::MAX);
                stats.ping_latency_human = human(latency);
                stats.ping_response = reply;
            }
            Err(e) => stats.ping_response = e.to_string(),
        }
        stats
    }
}
