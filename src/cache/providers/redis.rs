//! Redis store provider
//!
//! One generic store over any async redis connection: `ConnectionManager`
//! for standalone servers, `MultiplexedConnection` for sentinel masters and
//! single cluster nodes, and `ClusterConnection` for cluster deployments.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::StoreClient;
use redis::aio::{ConnectionLike, ConnectionManager, MultiplexedConnection};
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::time::Duration;
use tracing::debug;

/// Redis-backed store over any async connection type
///
/// Each call clones the connection handle; the underlying transports are
/// multiplexed and safe for concurrent use.
#[derive(Clone)]
pub struct RedisStore<C> {
    connection: C,
    label: &'static str,
}

impl<C> std::fmt::Debug for RedisStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &self.label)
            .finish()
    }
}

/// Split `host:port`, accepting bracketed or bare IPv6 hosts
pub fn parse_address(address: &str) -> CacheResult<(String, u16)> {
    let address = address.trim();
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        CacheError::Connection(format!("address {address:?} must be host:port"))
    })?;
    let port = port.parse::<u16>().map_err(|e| {
        CacheError::Connection(format!("invalid port in address {address:?}: {e}"))
    })?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(CacheError::Connection(format!(
            "address {address:?} has no host"
        )));
    }
    Ok((host.to_string(), port))
}

/// Build connection info for one TCP endpoint
pub fn connection_info(address: &str, redis: RedisConnectionInfo) -> CacheResult<ConnectionInfo> {
    let (host, port) = parse_address(address)?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis,
    })
}

fn connect_error(target: &str, e: redis::RedisError) -> CacheError {
    CacheError::Connection(format!("failed to connect to {target}: {e}"))
}

impl RedisStore<ConnectionManager> {
    /// Connect to a standalone server with automatic reconnection
    pub async fn standalone(address: &str, redis: RedisConnectionInfo) -> CacheResult<Self> {
        let info = connection_info(address, redis)?;
        let client = redis::Client::open(info)
            .map_err(|e| connect_error(address, e))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| connect_error(address, e))?;

        debug!(address = address, "Redis standalone store connected");
        Ok(Self {
            connection,
            label: "ConnectionManager",
        })
    }
}

impl RedisStore<MultiplexedConnection> {
    /// Connect directly to a single node
    pub async fn node(address: &str, redis: RedisConnectionInfo) -> CacheResult<Self> {
        let info = connection_info(address, redis)?;
        let client = redis::Client::open(info)
            .map_err(|e| connect_error(address, e))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| connect_error(address, e))?;

        debug!(address = address, "Redis node store connected");
        Ok(Self {
            connection,
            label: "MultiplexedConnection",
        })
    }

    /// Resolve the master through sentinels and connect to it
    pub async fn sentinel(
        sentinels: Vec<ConnectionInfo>,
        master_name: &str,
        redis: RedisConnectionInfo,
    ) -> CacheResult<Self> {
        let node_info = SentinelNodeConnectionInfo {
            tls_mode: None,
            redis_connection_info: Some(redis),
        };
        let mut client = SentinelClient::build(
            sentinels,
            master_name.to_string(),
            Some(node_info),
            SentinelServerType::Master,
        )
        .map_err(|e| connect_error(master_name, e))?;
        let connection = client
            .get_async_connection()
            .await
            .map_err(|e| connect_error(master_name, e))?;

        debug!(master = master_name, "Redis sentinel store connected");
        Ok(Self {
            connection,
            label: "SentinelMaster",
        })
    }
}

impl<C> StoreClient for RedisStore<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn ping(&self) -> CacheResult<String> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("PING", "", e))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let result: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("GET", key, e))?;

        if result.is_some() {
            debug!(key = key, "Cache HIT");
        } else {
            debug!(key = key, "Cache MISS");
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }

        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::backend("SET", key, e))?;

        debug!(key = key, ttl_ms = ttl.map(ttl_millis), "Cache SET");
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }

        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("SET NX", key, e))?;

        debug!(key = key, created = reply.is_some(), "Cache SET NX");
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.connection.clone();
        let count: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("DEL", key, e))?;

        debug!(key = key, count = count, "Cache DEL");
        Ok(count)
    }

    async fn exists(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.connection.clone();
        redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("EXISTS", key, e))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.connection.clone();
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("SCAN", pattern, e))
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    super::millis(ttl).max(1)
}

/// Redis cluster store with per-master access for fan-out
#[derive(Clone)]
pub struct RedisClusterStore {
    inner: RedisStore<ClusterConnection>,
    node_info: RedisConnectionInfo,
}

impl std::fmt::Debug for RedisClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClusterStore")
            .field("inner", &self.inner)
            .finish()
    }
}

impl RedisClusterStore {
    /// Connect to a cluster through its seed nodes
    pub async fn connect(addresses: &[String], redis: RedisConnectionInfo) -> CacheResult<Self> {
        let seeds = addresses
            .iter()
            .map(|addr| connection_info(addr, RedisConnectionInfo::default()))
            .collect::<CacheResult<Vec<_>>>()?;

        let mut builder = ClusterClientBuilder::new(seeds);
        if let Some(username) = &redis.username {
            builder = builder.username(username.clone());
        }
        if let Some(password) = &redis.password {
            builder = builder.password(password.clone());
        }
        let client = builder
            .build()
            .map_err(|e| connect_error("cluster", e))?;
        let connection = client
            .get_async_connection()
            .await
            .map_err(|e| connect_error("cluster", e))?;

        debug!(seeds = addresses.len(), "Redis cluster store connected");
        Ok(Self {
            inner: RedisStore {
                connection,
                label: "ClusterConnection",
            },
            node_info: RedisConnectionInfo {
                db: 0,
                ..redis
            },
        })
    }

    /// Open a direct connection to every healthy master
    pub async fn masters(&self) -> CacheResult<Vec<RedisStore<MultiplexedConnection>>> {
        let mut conn = self.inner.connection.clone();
        let nodes: String = redis::cmd("CLUSTER")
            .arg("NODES")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("CLUSTER NODES", "", e))?;

        let addresses = master_addresses(&nodes);
        debug!(masters = addresses.len(), "Resolved cluster masters");

        let connects = addresses
            .iter()
            .map(|addr| RedisStore::node(addr, self.node_info.clone()));
        futures::future::try_join_all(connects).await
    }

    pub fn store(&self) -> &RedisStore<ClusterConnection> {
        &self.inner
    }
}

/// Extract `host:port` of every connected master from `CLUSTER NODES` output
fn master_addresses(nodes: &str) -> Vec<String> {
    nodes
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return None;
            }
            let flags: Vec<&str> = fields[2].split(',').collect();
            let healthy = flags.contains(&"master")
                && !flags
                    .iter()
                    .any(|f| matches!(*f, "fail" | "fail?" | "noaddr" | "handshake"));
            if !healthy {
                return None;
            }
            // ip:port@cport[,hostname]
            let endpoint = fields[1].split('@').next()?;
            if endpoint.starts_with(':') {
                return None;
            }
            Some(endpoint.to_string())
        })
        .collect()
}
